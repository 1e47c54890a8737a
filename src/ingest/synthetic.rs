//! Synthetic frame source (`stub://`).
//!
//! Produces JPEG-encoded gradient frames whose pattern shifts every frame.
//! With `frame_limit` set the source ends after that many frames.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::{frame_timestamp, FrameSource, SourceStats};
use crate::frame::{encode_jpeg, EncodedFrame};

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            frame_limit: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.target_fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic frames need non-zero dimensions"));
        }
        Ok(Self {
            config,
            frame_count: 0,
            connected: false,
        })
    }

    fn generate(&self) -> RgbImage {
        let shift = self.frame_count as u32;
        RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift / 2) % 256) as u8,
                ((x ^ y) % 256) as u8,
            ])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.config.name);
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<EncodedFrame>> {
        if !self.connected {
            return Err(anyhow!("SyntheticSource: next_frame called before connect"));
        }
        if self
            .config
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        let bytes = encode_jpeg(&self.generate(), 80)?;
        let captured_at = frame_timestamp(self.frame_count, self.config.target_fps);
        let label = format!("synthetic_{:06}", self.frame_count);
        self.frame_count += 1;
        Ok(Some(EncodedFrame::new(bytes, captured_at, label)))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.config.name.clone(),
        }
    }
}
