//! Frame ingestion sources.
//!
//! Sources produce `EncodedFrame`s with capture timestamps derived from their
//! position in the stream and the target frame rate, so the persistence window
//! sees monotonic time regardless of how fast frames are processed.
//!
//! - Local JPEG directories
//! - Synthetic source (`stub://`), for tests and demos

pub mod directory;
pub mod synthetic;

use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::frame::EncodedFrame;

pub use directory::{DirectoryConfig, DirectorySource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Counters reported by every source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

/// A finite or endless stream of encoded frames.
pub trait FrameSource {
    /// Open the source. Must be called before `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<EncodedFrame>>;

    fn stats(&self) -> SourceStats;
}

/// Open a source from a location string.
///
/// `stub://<name>` yields synthetic frames; anything else must be a local
/// directory path. Remote URL schemes are rejected.
pub fn open_source(location: &str, target_fps: u32) -> Result<Box<dyn FrameSource>> {
    if location.trim().is_empty() {
        return Err(anyhow!("frame source location is empty"));
    }
    if location.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            name: location.to_string(),
            target_fps,
            ..SyntheticConfig::default()
        })?));
    }
    if location.contains("://") {
        return Err(anyhow!(
            "frame sources only support local directories and stub:// (got {})",
            location
        ));
    }
    Ok(Box::new(DirectorySource::new(DirectoryConfig {
        path: location.into(),
        target_fps,
    })?))
}

/// Capture time of the `index`-th frame (zero-based) at `fps`.
pub(crate) fn frame_timestamp(index: u64, fps: u32) -> Duration {
    Duration::from_secs_f64(index as f64 / fps.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_follow_frame_rate() {
        assert_eq!(frame_timestamp(0, 10), Duration::ZERO);
        assert_eq!(frame_timestamp(20, 10), Duration::from_secs(2));
        assert_eq!(frame_timestamp(3, 2), Duration::from_millis(1500));
    }

    #[test]
    fn remote_urls_are_rejected() {
        assert!(open_source("rtsp://camera/stream", 10).is_err());
        assert!(open_source("", 10).is_err());
        assert!(open_source("stub://demo", 10).is_ok());
    }
}
