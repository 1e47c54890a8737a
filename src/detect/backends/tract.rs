#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CANDIDATE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 300;

/// Tract-based backend for YOLOv5-style ONNX models.
///
/// Expects a single `[1, N, 5 + classes]` output of `cx, cy, w, h, objectness`
/// followed by per-class scores, in model input pixels. Boxes are rescaled to
/// the source frame after per-class non-maximum suppression.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    class_names: Vec<String>,
    candidate_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, class_names: Vec<String>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = DEFAULT_INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        if class_names.is_empty() {
            return Err(anyhow!("tract backend needs at least one class name"));
        }

        Ok(Self {
            model,
            input_size: DEFAULT_INPUT_SIZE,
            class_names,
            candidate_threshold: DEFAULT_CANDIDATE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    fn build_input(&self, frame: &RgbImage) -> Tensor {
        let resized = imageops::resize(frame, self.input_size, self.input_size, FilterType::Triangle);
        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame_w: u32, frame_h: u32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not rank 3")?;
        let shape = view.shape().to_vec();
        if shape[2] < 6 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let classes = shape[2] - 5;
        let scale_x = frame_w as f32 / self.input_size as f32;
        let scale_y = frame_h as f32 / self.input_size as f32;

        let mut candidates: Vec<(usize, Detection)> = Vec::new();
        for row in 0..shape[1] {
            let objectness = view[[0, row, 4]];
            if objectness <= self.candidate_threshold {
                continue;
            }
            let (class_idx, class_score) = (0..classes)
                .map(|c| (c, view[[0, row, 5 + c]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            let confidence = objectness * class_score;
            if confidence <= self.candidate_threshold {
                continue;
            }
            let (cx, cy, w, h) = (
                view[[0, row, 0]],
                view[[0, row, 1]],
                view[[0, row, 2]],
                view[[0, row, 3]],
            );
            let bbox = BoundingBox::new(
                ((cx - w / 2.0) * scale_x).clamp(0.0, frame_w as f32),
                ((cy - h / 2.0) * scale_y).clamp(0.0, frame_h as f32),
                ((cx + w / 2.0) * scale_x).clamp(0.0, frame_w as f32),
                ((cy + h / 2.0) * scale_y).clamp(0.0, frame_h as f32),
            );
            let class = self
                .class_names
                .get(class_idx)
                .cloned()
                .unwrap_or_else(|| format!("class{}", class_idx));
            candidates.push((class_idx, Detection::new(class, confidence, bbox)));
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Greedy per-class NMS, highest confidence first.
fn non_max_suppression(mut candidates: Vec<(usize, Detection)>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));
    let mut kept: Vec<(usize, Detection)> = Vec::new();
    for (class_idx, det) in candidates {
        let suppressed = kept
            .iter()
            .any(|(k_idx, k)| *k_idx == class_idx && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push((class_idx, det));
            if kept.len() >= MAX_DETECTIONS {
                break;
            }
        }
    }
    kept.into_iter().map(|(_, det)| det).collect()
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame.width(), frame.height())
    }
}
