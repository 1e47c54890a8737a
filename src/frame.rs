//! Decoded frames and the JPEG boundary around them.
//!
//! - `Frame`: decoded RGB pixels plus capture time, owned by a single tick.
//! - `decode_jpeg` / `encode_jpeg`: the codec edges of the pipeline.
//! - `downscale_to_max_width`: bounds per-frame work before detection.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};

use crate::error::TickError;

/// A decoded frame. Dropped at the end of the tick that produced it.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    /// Capture time relative to session start.
    pub captured_at: Duration,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: Duration) -> Self {
        Self { image, captured_at }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Decode an encoded frame, downscaling it to at most `max_width` columns.
    pub fn decode(encoded: &EncodedFrame, max_width: u32) -> Result<Self, TickError> {
        if let Some(reason) = &encoded.read_error {
            return Err(TickError::DecodeFailure(reason.clone()));
        }
        let image = decode_jpeg(&encoded.bytes)?;
        Ok(Self::new(
            downscale_to_max_width(image, max_width),
            encoded.captured_at,
        ))
    }
}

/// Compressed frame bytes as they arrive from a source.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub captured_at: Duration,
    /// Source-specific name, e.g. the file it was read from.
    pub label: String,
    /// Set when the source could not read this frame's bytes.
    pub read_error: Option<String>,
}

impl EncodedFrame {
    pub fn new(bytes: Vec<u8>, captured_at: Duration, label: impl Into<String>) -> Self {
        Self {
            bytes,
            captured_at,
            label: label.into(),
            read_error: None,
        }
    }

    /// A frame slot the source could not read. Decoding it fails, so the
    /// tick is handled as no signal and the stream moves on.
    pub fn unreadable(captured_at: Duration, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            bytes: Vec::new(),
            captured_at,
            label: label.into(),
            read_error: Some(reason.into()),
        }
    }
}

/// Decode JPEG bytes into RGB. Any failure is a `DecodeFailure`.
pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage, TickError> {
    if bytes.is_empty() {
        return Err(TickError::DecodeFailure("empty frame buffer".into()));
    }
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| TickError::DecodeFailure(e.to_string()))?;
    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(TickError::DecodeFailure("decoded frame has no pixels".into()));
    }
    Ok(rgb)
}

/// Encode RGB pixels as JPEG at `quality` (1..=100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        return Err(anyhow!("jpeg quality {} outside 1..=100", quality));
    }
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode_image(image)
            .context("failed to encode frame as jpeg")?;
    }
    Ok(buf.into_inner())
}

/// Shrink `image` so it is at most `max_width` wide, preserving aspect ratio.
pub fn downscale_to_max_width(image: RgbImage, max_width: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if max_width == 0 || w <= max_width {
        return image;
    }
    let scale = max_width as f64 / w as f64;
    let new_h = ((h as f64 * scale) as u32).max(1);
    imageops::resize(&image, max_width, new_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
    }

    #[test]
    fn jpeg_encode_decode_keeps_dimensions() {
        let image = gradient(64, 48);
        let bytes = encode_jpeg(&image, 50).unwrap();
        let decoded = decode_jpeg(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn garbage_bytes_are_a_decode_failure() {
        let err = decode_jpeg(b"not a jpeg").unwrap_err();
        assert!(matches!(err, TickError::DecodeFailure(_)));
        assert!(matches!(decode_jpeg(&[]), Err(TickError::DecodeFailure(_))));
    }

    #[test]
    fn unreadable_frame_decodes_as_failure() {
        let frame = EncodedFrame::unreadable(Duration::ZERO, "001.jpg", "permission denied");
        match Frame::decode(&frame, 320) {
            Err(TickError::DecodeFailure(reason)) => assert_eq!(reason, "permission denied"),
            other => panic!("unexpected {:?}", other.map(|f| f.captured_at)),
        }
    }

    #[test]
    fn downscale_preserves_aspect_ratio() {
        let image = downscale_to_max_width(gradient(640, 480), 320);
        assert_eq!(image.dimensions(), (320, 240));
        let small = downscale_to_max_width(gradient(200, 100), 320);
        assert_eq!(small.dimensions(), (200, 100));
    }

    #[test]
    fn encode_rejects_bad_quality() {
        assert!(encode_jpeg(&gradient(4, 4), 0).is_err());
    }
}
