//! Overlay text drawn with a TrueType font.
//!
//! The font is read from a file named in the configuration. Without one the
//! renderer still draws all chrome and boxes but leaves out the warning text
//! and detection labels.

use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use super::geometry::InkBounds;

/// Coverage at or above which a pixel counts as ink when measuring.
const INK_LEVEL: u8 = 128;

/// Fonts tried when no font path is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// A loaded font plus the place it came from.
#[derive(Clone)]
pub struct OverlayFont {
    font: FontArc,
    source: String,
}

impl OverlayFont {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font file {}", path.display()))?;
        Self::from_bytes(data, path.display().to_string())
    }

    pub fn from_bytes(data: Vec<u8>, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let font = FontArc::try_from_vec(data)
            .map_err(|e| anyhow!("invalid font {}: {}", source, e))?;
        Ok(Self { font, source })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Ink extent of `text` at `px` pixels, relative to the draw origin.
    ///
    /// Returns `None` when nothing would be drawn.
    pub fn measure(&self, text: &str, px: f32) -> Option<InkBounds> {
        let (w, h) = text_size(px, &self.font, text);
        if w == 0 || h == 0 {
            return None;
        }
        // Glyphs hang below the origin by up to the ascent and may overhang
        // the advance box on either side.
        let pad = px.ceil().max(1.0) as u32;
        let mut canvas = GrayImage::new(w + 2 * pad, h + 2 * pad);
        draw_text_mut(
            &mut canvas,
            Luma([255]),
            pad as i32,
            pad as i32,
            px,
            &self.font,
            text,
        );

        let mut extent: Option<(u32, u32, u32, u32)> = None;
        for (x, y, p) in canvas.enumerate_pixels() {
            if p[0] < INK_LEVEL {
                continue;
            }
            extent = Some(match extent {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        extent.map(|(x0, y0, x1, y1)| InkBounds {
            left: x0 as i32 - pad as i32,
            top: y0 as i32 - pad as i32,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        })
    }

    /// Draw `text` with its origin at (`x`, `y`). Clipped to the image.
    pub fn draw(&self, image: &mut RgbImage, text: &str, x: i32, y: i32, px: f32, color: Rgb<u8>) {
        draw_text_mut(image, color, x, y, px, &self.font, text);
    }
}

impl fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayFont")
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for OverlayFont {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// First well-known system font that exists on this machine.
pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}
