use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Replays a fixed sequence of per-frame detections.
///
/// Each call to `detect` consumes one entry. `None` entries simulate a
/// detector failure for that frame. Once the script is exhausted every frame
/// yields an empty detection list.
pub struct ScriptedBackend {
    frames: VecDeque<Option<Vec<Detection>>>,
    served: u64,
}

#[derive(Debug, Deserialize)]
struct ScriptedDetection {
    class: String,
    confidence: f32,
    bbox: [f32; 4],
}

impl ScriptedBackend {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into_iter().map(Some).collect(),
            served: 0,
        }
    }

    /// Script with explicit failures (`None`) interleaved.
    pub fn with_failures(frames: Vec<Option<Vec<Detection>>>) -> Self {
        Self {
            frames: frames.into(),
            served: 0,
        }
    }

    /// Parse a JSON-lines script.
    ///
    /// One line per frame: an array of `{"class", "confidence", "bbox": [x1, y1, x2, y2]}`
    /// objects, or `null` for a frame where the detector fails. Blank lines and
    /// lines starting with `#` are skipped.
    pub fn from_jsonl(raw: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry: Option<Vec<ScriptedDetection>> = serde_json::from_str(line)
                .map_err(|e| anyhow!("invalid detection script line {}: {}", idx + 1, e))?;
            frames.push(entry.map(|dets| {
                dets.into_iter()
                    .map(|d| {
                        let [x1, y1, x2, y2] = d.bbox;
                        Detection::new(d.class, d.confidence, BoundingBox::new(x1, y1, x2, y2))
                    })
                    .collect()
            }));
        }
        Ok(Self::with_failures(frames))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        Self::from_jsonl(&raw)
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn served(&self) -> u64 {
        self.served
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        self.served += 1;
        match self.frames.pop_front() {
            Some(Some(detections)) => Ok(detections),
            Some(None) => Err(anyhow!("scripted failure at frame {}", self.served)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_and_replays_in_order() {
        let script = r#"
# frame 1: one fall
[{"class": "Fallen", "confidence": 0.91, "bbox": [10, 20, 110, 80]}]
[]
null
"#;
        let mut backend = ScriptedBackend::from_jsonl(script).unwrap();
        assert_eq!(backend.remaining(), 3);
        let frame = RgbImage::new(2, 2);

        let first = backend.detect(&frame).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].class, "Fallen");
        assert_eq!(first[0].bbox, BoundingBox::new(10.0, 20.0, 110.0, 80.0));

        assert!(backend.detect(&frame).unwrap().is_empty());
        assert!(backend.detect(&frame).is_err());
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.served(), 4);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = match ScriptedBackend::from_jsonl("[]\n{oops}\n") {
            Ok(_) => panic!("expected parse failure"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("line 2"));
    }
}
