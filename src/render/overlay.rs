use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::config::RenderConfig;
use crate::detect::{Detection, DetectionSample};

use super::geometry::{AlertGeometry, ExclamationMark, PixelRect};
use super::text::OverlayFont;

pub const WARNING_TEXT: &str = "WARNING";
pub const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const BAR_BASE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const WARNING_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

pub const ALERT_STROKE: u32 = 4;
pub const HIGHLIGHT_STROKE: u32 = 2;
/// Detection label font size, in pixels.
const LABEL_TEXT_PX: f32 = 14.0;
const LABEL_GAP: i32 = 4;

/// Composite alert chrome and detection boxes onto a copy of `frame`.
///
/// Chrome is only drawn while `persistent` is set, and the warning text only
/// when `blink_visible` is also set. Detection boxes above the confidence
/// threshold are drawn on every call. The output has the dimensions of `frame`.
/// Text needs `config.font`; without it text is skipped.
pub fn render(
    frame: &RgbImage,
    sample: &DetectionSample,
    persistent: bool,
    blink_visible: bool,
    config: &RenderConfig,
) -> RgbImage {
    if frame.width() == 0 || frame.height() == 0 {
        return frame.clone();
    }
    let mut out = if persistent {
        match AlertGeometry::compute(frame.width(), frame.height(), &config.proportions) {
            Ok(geometry) => {
                let mut scratch = frame.clone();
                draw_chrome(&mut scratch, &geometry, blink_visible, config.font.as_ref());
                blend(&scratch, frame, config.alpha_blend)
            }
            Err(err) => {
                log::debug!("skipping alert chrome: {}", err);
                frame.clone()
            }
        }
    } else {
        frame.clone()
    };
    draw_detections(&mut out, sample, persistent, config);
    out
}

fn draw_chrome(
    image: &mut RgbImage,
    geometry: &AlertGeometry,
    blink_visible: bool,
    font: Option<&OverlayFont>,
) {
    for rect in geometry.border_rects() {
        fill(image, rect, ALERT_COLOR);
    }
    fill(image, geometry.top_bar_rect(), ALERT_COLOR);

    if blink_visible {
        let px = geometry.warning_text_px();
        let ink = font.and_then(|font| font.measure(WARNING_TEXT, px));
        let layout = geometry.warning_layout(ink);
        for mark in &layout.marks {
            draw_exclamation(image, mark);
        }
        if let (Some(font), false) = (font, layout.text.is_empty()) {
            let (x, y) = layout.origin;
            font.draw(image, WARNING_TEXT, x, y, px, WARNING_TEXT_COLOR);
        }
    }

    fill(image, geometry.bottom_bar_rect(), BAR_BASE_COLOR);
    for stripe in geometry.stripe_rects() {
        fill(image, stripe, ALERT_COLOR);
    }
}

fn draw_exclamation(image: &mut RgbImage, mark: &ExclamationMark) {
    let bar = mark.bar();
    fill(image, bar, WARNING_TEXT_COLOR);
    let cap = mark.cap_radius();
    if cap > 0 {
        draw_filled_circle_mut(image, (mark.center_x, bar.y), cap, WARNING_TEXT_COLOR);
    }
    draw_filled_circle_mut(image, mark.dot_center(), mark.dot_radius(), WARNING_TEXT_COLOR);
}

/// `scratch * alpha + original * (1 - alpha)` over every pixel.
fn blend(scratch: &RgbImage, original: &RgbImage, alpha: f32) -> RgbImage {
    let beta = 1.0 - alpha;
    let mut out = RgbImage::new(original.width(), original.height());
    for ((dst, s), o) in out
        .pixels_mut()
        .zip(scratch.pixels())
        .zip(original.pixels())
    {
        for c in 0..3 {
            let v = s[c] as f32 * alpha + o[c] as f32 * beta;
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn draw_detections(
    image: &mut RgbImage,
    sample: &DetectionSample,
    persistent: bool,
    config: &RenderConfig,
) {
    let scale = (
        axis_scale(image.width(), sample.width),
        axis_scale(image.height(), sample.height),
    );
    for det in sample.above(config.conf_threshold) {
        let alert = persistent && config.qualifying_classes.contains(&det.class);
        let (color, stroke) = if alert {
            (ALERT_COLOR, ALERT_STROKE)
        } else {
            (HIGHLIGHT_COLOR, HIGHLIGHT_STROKE)
        };
        draw_detection(image, det, scale, color, stroke, config.font.as_ref());
    }
}

fn draw_detection(
    image: &mut RgbImage,
    det: &Detection,
    scale: (f32, f32),
    color: Rgb<u8>,
    stroke: u32,
    font: Option<&OverlayFont>,
) {
    // Clamp to just outside the frame so the stroke still clips at the edge.
    let margin = stroke as f32;
    let (w, h) = (image.width() as f32, image.height() as f32);
    let to_x = |v: f32| (v * scale.0).clamp(-margin, w + margin).round() as i32;
    let to_y = |v: f32| (v * scale.1).clamp(-margin, h + margin).round() as i32;
    let (x1, y1) = (to_x(det.bbox.x1), to_y(det.bbox.y1));
    let (x2, y2) = (to_x(det.bbox.x2), to_y(det.bbox.y2));
    let width = x2.saturating_sub(x1).max(1) as u32;
    let height = y2.saturating_sub(y1).max(1) as u32;
    for i in 0..stroke {
        let offset_rect = Rect::at(x1 - i as i32, y1 - i as i32).of_size(width + 2 * i, height + 2 * i);
        draw_hollow_rect_mut(image, offset_rect, color);
    }

    let Some(font) = font else {
        return;
    };
    let label = det.label();
    let Some(ink) = font.measure(&label, LABEL_TEXT_PX) else {
        return;
    };
    let ink_bottom = ink.top.saturating_add(ink.height as i32);
    let label_y = y1
        .saturating_sub(stroke as i32)
        .saturating_sub(LABEL_GAP)
        .saturating_sub(ink_bottom)
        .max(-ink.top);
    font.draw(image, &label, x1, label_y, LABEL_TEXT_PX, color);
}

/// Detections may come from a resized copy of the frame.
fn axis_scale(frame_len: u32, sample_len: u32) -> f32 {
    if sample_len == 0 {
        1.0
    } else {
        frame_len as f32 / sample_len as f32
    }
}

fn fill(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>) {
    if rect.is_empty() {
        return;
    }
    draw_filled_rect_mut(
        image,
        Rect::at(rect.x, rect.y).of_size(rect.width, rect.height),
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use std::time::Duration;

    #[test]
    fn blend_weights_scratch_over_original() {
        let scratch = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        let original = RgbImage::from_pixel(2, 2, Rgb([0, 100, 255]));
        let out = blend(&scratch, &original, 0.6);
        assert_eq!(*out.get_pixel(1, 1), Rgb([153, 193, 255]));
    }

    #[test]
    fn blend_of_identical_images_is_identity() {
        let image = RgbImage::from_fn(16, 16, |x, y| Rgb([x as u8 * 15, y as u8 * 15, 7]));
        assert_eq!(blend(&image, &image, 0.6), image);
    }

    #[test]
    fn zero_sized_frame_is_returned_unchanged() {
        let frame = RgbImage::new(0, 0);
        let sample = DetectionSample::new(
            vec![Detection::new("fallen", 0.9, BoundingBox::new(0.0, 0.0, 5.0, 5.0))],
            0,
            0,
            Duration::ZERO,
        );
        let out = render(&frame, &sample, true, true, &RenderConfig::default());
        assert_eq!(out.dimensions(), (0, 0));
    }

    #[test]
    fn huge_and_offscreen_boxes_are_clipped() {
        let frame = RgbImage::new(64, 48);
        let sample = DetectionSample::new(
            vec![
                Detection::new("person", 0.9, BoundingBox::new(-3.0e9, 0.0, 10.0, 10.0)),
                Detection::new("person", 0.9, BoundingBox::new(0.0, 0.0, 2.0e8, 2.0e8)),
                Detection::new("person", 0.9, BoundingBox::new(f32::NAN, 5.0, 20.0, f32::INFINITY)),
            ],
            64,
            48,
            Duration::ZERO,
        );
        let out = render(&frame, &sample, false, false, &RenderConfig::default());
        assert_eq!(out.dimensions(), (64, 48));
        // First box: left edge clipped away, right edge at x = 10.
        assert_eq!(*out.get_pixel(10, 5), HIGHLIGHT_COLOR);
        // Second box: top-left corner on the frame.
        assert_eq!(*out.get_pixel(0, 0), HIGHLIGHT_COLOR);
    }

    #[test]
    fn boxes_scale_from_sample_space() {
        let frame = RgbImage::new(200, 200);
        let sample = DetectionSample::new(
            vec![Detection::new("person", 0.9, BoundingBox::new(10.0, 30.0, 50.0, 90.0))],
            100,
            100,
            Duration::ZERO,
        );
        let out = render(&frame, &sample, false, false, &RenderConfig::default());
        assert_eq!(*out.get_pixel(20, 120), HIGHLIGHT_COLOR);
        assert_eq!(*out.get_pixel(10, 30), Rgb([0, 0, 0]));
    }
}
