use crate::config::OverlayProportions;
use crate::error::GeometryError;

/// Warning text pixel size as a fraction of the top bar height.
const WARNING_TEXT_FRACTION: f32 = 0.5;

/// Pixel rectangle, half-open on the right and bottom edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Last column covered, inclusive.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32 - 1
    }

    /// Last row covered, inclusive.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32 - 1
    }
}

/// Inked area of a piece of text, relative to the point it is drawn from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InkBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Alert chrome measurements for one frame size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertGeometry {
    pub width: u32,
    pub height: u32,
    pub border: u32,
    pub top_bar: u32,
    pub stripe_height: u32,
    /// Width of one stripe segment, filled and unfilled parts together.
    pub stripe_segment: u32,
    /// Filled width inside each segment.
    pub stripe_fill: u32,
    pub stripe_count: u32,
    pub glyph_offset: u32,
}

impl AlertGeometry {
    pub fn compute(
        width: u32,
        height: u32,
        proportions: &OverlayProportions,
    ) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::DegenerateFrame { width, height });
        }
        let border = scaled(width, proportions.border);
        let top_bar = scaled(height, proportions.top_bar);
        let stripe_height = scaled(height, proportions.stripe);
        let stripe_count = proportions.stripe_count.max(1);
        let stripe_segment = width.saturating_sub(2 * border) / stripe_count;
        let stripe_fill = scaled(stripe_segment, proportions.stripe_fill);
        let glyph_offset = scaled(width, proportions.glyph_offset);
        Ok(Self {
            width,
            height,
            border,
            top_bar,
            stripe_height,
            stripe_segment,
            stripe_fill,
            stripe_count,
            glyph_offset,
        })
    }

    fn inner_width(&self) -> u32 {
        self.width.saturating_sub(2 * self.border)
    }

    /// The four border strips: top, bottom, left, right.
    pub fn border_rects(&self) -> [PixelRect; 4] {
        let b = self.border.min(self.width).min(self.height);
        [
            PixelRect::new(0, 0, self.width, b),
            PixelRect::new(0, (self.height - b) as i32, self.width, b),
            PixelRect::new(0, 0, b, self.height),
            PixelRect::new((self.width - b) as i32, 0, b, self.height),
        ]
    }

    pub fn top_bar_rect(&self) -> PixelRect {
        PixelRect::new(
            self.border as i32,
            self.border as i32,
            self.inner_width(),
            self.top_bar,
        )
    }

    /// White bar sitting directly above the bottom border.
    pub fn bottom_bar_rect(&self) -> PixelRect {
        let y = self.height as i64 - self.border as i64 - self.stripe_height as i64;
        PixelRect::new(
            self.border as i32,
            y as i32,
            self.inner_width(),
            self.stripe_height,
        )
    }

    /// Filled part of each stripe segment, left to right.
    pub fn stripe_rects(&self) -> Vec<PixelRect> {
        let bar = self.bottom_bar_rect();
        (0..self.stripe_count)
            .map(|i| {
                PixelRect::new(
                    bar.x + (i * self.stripe_segment) as i32,
                    bar.y,
                    self.stripe_fill,
                    bar.height,
                )
            })
            .collect()
    }

    /// Font size for the warning text, in pixels.
    pub fn warning_text_px(&self) -> f32 {
        (self.top_bar as f32 * WARNING_TEXT_FRACTION).max(1.0)
    }

    /// Placement of the blinking warning text and its exclamation glyphs.
    ///
    /// `ink` is the measured extent of the text; with `None` only the glyphs
    /// are placed, either side of the frame centre.
    pub fn warning_layout(&self, ink: Option<InkBounds>) -> WarningLayout {
        let ink = ink.unwrap_or_default();
        let bar_mid = self.border as i32 + (self.top_bar / 2) as i32;
        let text_x = (self.width as i32 - ink.width as i32) / 2;
        let text_y = bar_mid - (ink.height / 2) as i32;

        let mark_height = (self.top_bar / 2).max(1);
        let mark_width = (self.top_bar / 10).max(1);
        let left_center = text_x - self.glyph_offset as i32;
        let right_center = text_x + ink.width as i32 + self.glyph_offset as i32;
        let mark_top = bar_mid - (mark_height / 2) as i32;

        WarningLayout {
            text: PixelRect::new(text_x, text_y, ink.width, ink.height),
            origin: (text_x - ink.left, text_y - ink.top),
            marks: [
                ExclamationMark::new(left_center, mark_top, mark_width, mark_height),
                ExclamationMark::new(right_center, mark_top, mark_width, mark_height),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarningLayout {
    /// Where the text ink lands. Empty when there is no text.
    pub text: PixelRect,
    /// Point to hand to the font so the ink lands on `text`.
    pub origin: (i32, i32),
    /// Left and right glyphs.
    pub marks: [ExclamationMark; 2],
}

/// A rounded vertical bar with a dot beneath it, centered on `center_x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExclamationMark {
    pub center_x: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl ExclamationMark {
    fn new(center_x: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            center_x,
            top,
            width,
            height,
        }
    }

    /// Radius of the rounded cap on top of the bar.
    pub fn cap_radius(&self) -> i32 {
        (self.width / 2) as i32
    }

    /// Straight part of the bar, below the cap.
    pub fn bar(&self) -> PixelRect {
        let cap = self.cap_radius();
        let bar_bottom = self.top + (self.height * 13 / 20) as i32;
        let bar_top = self.top + cap;
        PixelRect::new(
            self.center_x - cap,
            bar_top,
            self.width,
            (bar_bottom - bar_top).max(1) as u32,
        )
    }

    pub fn dot_radius(&self) -> i32 {
        ((self.width * 4 / 5) as i32).max(1)
    }

    pub fn dot_center(&self) -> (i32, i32) {
        (
            self.center_x,
            self.top + self.height as i32 - self.dot_radius(),
        )
    }
}

fn scaled(length: u32, fraction: f32) -> u32 {
    (length as f32 * fraction).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(w: u32, h: u32) -> AlertGeometry {
        AlertGeometry::compute(w, h, &OverlayProportions::default()).unwrap()
    }

    #[test]
    fn vga_measurements() {
        let g = geometry(640, 480);
        assert_eq!(g.border, 6);
        assert_eq!(g.top_bar, 72);
        assert_eq!(g.stripe_height, 24);
        assert_eq!(g.stripe_segment, 125);
        assert!((87..=88).contains(&g.stripe_fill));
        assert_eq!(g.glyph_offset, 51);
    }

    #[test]
    fn zero_dimension_is_degenerate() {
        let err = AlertGeometry::compute(0, 480, &OverlayProportions::default()).unwrap_err();
        assert_eq!(
            err,
            GeometryError::DegenerateFrame {
                width: 0,
                height: 480
            }
        );
    }

    #[test]
    fn bars_stay_inside_border() {
        let g = geometry(640, 480);
        let top = g.top_bar_rect();
        assert_eq!((top.x, top.y, top.width), (6, 6, 628));
        let bottom = g.bottom_bar_rect();
        assert_eq!(bottom.bottom(), 480 - 6 - 1);
        let stripes = g.stripe_rects();
        assert_eq!(stripes.len(), 5);
        assert_eq!(stripes[4].x, 6 + 4 * 125);
    }

    #[test]
    fn warning_layout_is_centered() {
        let g = geometry(640, 480);
        let ink = InkBounds {
            left: 2,
            top: 9,
            width: 161,
            height: 26,
        };
        let layout = g.warning_layout(Some(ink));
        let left = layout.text.x;
        let right = 640 - 1 - layout.text.right();
        assert!((left - right).abs() <= 1);
        assert_eq!(layout.origin, (layout.text.x - 2, layout.text.y - 9));
        let [l, r] = layout.marks;
        let text_mid2 = 2 * layout.text.x + layout.text.width as i32;
        assert_eq!(l.center_x + r.center_x, text_mid2);
        assert_eq!(r.center_x - (layout.text.right() + 1), 51);
    }

    #[test]
    fn text_is_vertically_inside_top_bar() {
        let g = geometry(640, 480);
        assert_eq!(g.warning_text_px(), 36.0);
        let layout = g.warning_layout(Some(InkBounds {
            left: 0,
            top: 7,
            width: 170,
            height: 26,
        }));
        assert!(layout.text.y >= g.border as i32);
        assert!(layout.text.bottom() < (g.border + g.top_bar) as i32);
    }

    #[test]
    fn glyphs_alone_straddle_the_centre() {
        let g = geometry(640, 480);
        let layout = g.warning_layout(None);
        assert!(layout.text.is_empty());
        let [l, r] = layout.marks;
        assert_eq!(l.center_x + r.center_x, 640);
    }

    #[test]
    fn tiny_frames_do_not_underflow() {
        let g = geometry(3, 2);
        assert_eq!(g.stripe_segment, 0);
        let bottom = g.bottom_bar_rect();
        assert!(bottom.y <= 2);
        let _ = g.warning_layout(None);
        let _ = g.border_rects();
    }
}
