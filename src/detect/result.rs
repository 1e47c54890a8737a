use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

/// Axis-aligned box in pixel space of the frame it was detected on.
///
/// Invariant: `x1 <= x2` and `y1 <= y2`. `new` normalizes swapped corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union, 0.0 when the boxes do not overlap.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One detector output. Never mutated after the backend produces it.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class: class.into(),
            confidence,
            bbox,
        }
    }

    /// Text drawn above the box, e.g. `fallen 0.87`.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class, self.confidence)
    }
}

/// Detections for a single frame plus the frame geometry and capture time.
///
/// Produced once per frame and dropped after the tick; nothing retains it.
#[derive(Clone, Debug, Default)]
pub struct DetectionSample {
    pub detections: Vec<Detection>,
    pub width: u32,
    pub height: u32,
    /// Capture time, relative to the start of the session.
    pub captured_at: Duration,
}

impl DetectionSample {
    pub fn new(detections: Vec<Detection>, width: u32, height: u32, captured_at: Duration) -> Self {
        Self {
            detections,
            width,
            height,
            captured_at,
        }
    }

    /// A sample where the detector ran and found nothing.
    pub fn empty(width: u32, height: u32, captured_at: Duration) -> Self {
        Self::new(Vec::new(), width, height, captured_at)
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detections strictly above `threshold`, in detector order.
    pub fn above<'a>(&'a self, threshold: f32) -> impl Iterator<Item = &'a Detection> + 'a {
        self.detections
            .iter()
            .filter(move |d| d.confidence > threshold)
    }
}

/// Case-insensitive set of class labels that count as a fall.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSet {
    labels: HashSet<String>,
}

impl ClassSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|label| label.as_ref().trim().to_lowercase())
                .filter(|label| !label.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, class: &str) -> bool {
        self.labels.contains(&class.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sorted labels, for logging and stable comparisons.
    pub fn sorted(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.labels.iter().cloned().collect();
        labels.sort();
        labels
    }
}

impl Default for ClassSet {
    fn default() -> Self {
        Self::new(["fallen", "lying"])
    }
}

impl<'de> Deserialize<'de> for ClassSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let labels = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::new(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_normalizes_corners() {
        let bbox = BoundingBox::new(50.0, 40.0, 10.0, 20.0);
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 50.0, 40.0));
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 20.0);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn class_set_matches_case_insensitively() {
        let set = ClassSet::new(["Fallen", " lying "]);
        assert!(set.contains("fallen"));
        assert!(set.contains("LYING"));
        assert!(!set.contains("standing"));
        assert_eq!(set.sorted(), vec!["fallen", "lying"]);
    }

    #[test]
    fn label_uses_two_decimals() {
        let det = Detection::new("lying", 0.876, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(det.label(), "lying 0.88");
    }

    #[test]
    fn above_is_strict() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let sample = DetectionSample::new(
            vec![
                Detection::new("fallen", 0.4, bbox),
                Detection::new("fallen", 0.41, bbox),
            ],
            10,
            10,
            Duration::ZERO,
        );
        assert_eq!(sample.above(0.4).count(), 1);
    }
}
