//! Local directory frame source.
//!
//! Reads `*.jpg` / `*.jpeg` files from one directory in lexical file-name
//! order. Bytes are handed over undecoded. A corrupt or unreadable file
//! surfaces later as a decode failure for that tick rather than stopping the
//! stream.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use super::{frame_timestamp, FrameSource, SourceStats};
use crate::frame::EncodedFrame;

/// Configuration for a local directory source.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    pub path: PathBuf,
    /// Frame rate used to derive capture timestamps.
    pub target_fps: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            target_fps: 10,
        }
    }
}

pub struct DirectorySource {
    config: DirectoryConfig,
    files: Vec<PathBuf>,
    next_index: usize,
    frames_captured: u64,
    connected: bool,
}

impl DirectorySource {
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        if config.target_fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        Ok(Self {
            config,
            files: Vec::new(),
            next_index: 0,
            frames_captured: 0,
            connected: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.next_index)
    }
}

impl FrameSource for DirectorySource {
    fn connect(&mut self) -> Result<()> {
        let dir = &self.config.path;
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory {}", dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_jpeg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
            if path.is_file() && is_jpeg {
                files.push(path);
            }
        }
        files.sort();
        log::info!(
            "DirectorySource: connected to {} ({} frames)",
            dir.display(),
            files.len()
        );
        self.files = files;
        self.next_index = 0;
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<EncodedFrame>> {
        if !self.connected {
            return Err(anyhow!("DirectorySource: next_frame called before connect"));
        }
        let index = self.next_index;
        let Some(path) = self.files.get(index) else {
            return Ok(None);
        };
        self.next_index += 1;
        self.frames_captured += 1;
        let captured_at = frame_timestamp(index as u64, self.config.target_fps);
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(EncodedFrame::new(bytes, captured_at, label))),
            Err(err) => {
                log::warn!("DirectorySource: failed to read {}: {}", path.display(), err);
                Ok(Some(EncodedFrame::unreadable(
                    captured_at,
                    label,
                    format!("failed to read frame {}: {}", path.display(), err),
                )))
            }
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            location: self.config.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn reads_jpegs_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("002.jpg"), b"second")?;
        std::fs::write(dir.path().join("001.JPG"), b"first")?;
        std::fs::write(dir.path().join("notes.txt"), b"skip")?;

        let mut source = DirectorySource::new(DirectoryConfig {
            path: dir.path().to_path_buf(),
            target_fps: 2,
        })?;
        source.connect()?;
        assert_eq!(source.remaining(), 2);

        let first = source.next_frame()?.expect("first frame");
        assert_eq!(first.bytes, b"first");
        assert_eq!(first.captured_at, Duration::ZERO);
        let second = source.next_frame()?.expect("second frame");
        assert_eq!(second.label, "002.jpg");
        assert_eq!(second.captured_at, Duration::from_millis(500));
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn missing_file_is_skipped_as_unreadable() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("001.jpg"), b"first")?;
        std::fs::write(dir.path().join("002.jpg"), b"second")?;

        let mut source = DirectorySource::new(DirectoryConfig {
            path: dir.path().to_path_buf(),
            target_fps: 10,
        })?;
        source.connect()?;
        std::fs::remove_file(dir.path().join("001.jpg"))?;

        let first = source.next_frame()?.expect("slot for the missing file");
        assert_eq!(first.label, "001.jpg");
        let reason = first.read_error.expect("read error recorded");
        assert!(reason.contains("failed to read frame"), "{}", reason);
        assert_eq!(source.remaining(), 1);

        let second = source.next_frame()?.expect("second frame");
        assert_eq!(second.bytes, b"second");
        assert!(second.read_error.is_none());
        assert_eq!(second.captured_at, Duration::from_millis(100));
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn next_frame_requires_connect() {
        let mut source = DirectorySource::new(DirectoryConfig::default()).unwrap();
        assert!(source.next_frame().is_err());
    }
}
