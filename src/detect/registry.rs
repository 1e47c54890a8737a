use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::result::DetectionSample;
use crate::error::TickError;

use super::backend::DetectorBackend;

/// Thread-safe registry of detector backends.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Warm up every registered backend.
    pub fn warm_up_all(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
            guard.warm_up()?;
        }
        Ok(())
    }

    /// Run the default backend on a frame.
    ///
    /// A missing backend, a poisoned lock and a backend error all map to
    /// `TickError::DetectorUnavailable`. An empty detection list is a valid sample.
    pub fn infer(
        &self,
        frame: &RgbImage,
        captured_at: Duration,
    ) -> Result<DetectionSample, TickError> {
        let backend = self
            .default_backend()
            .ok_or_else(|| TickError::DetectorUnavailable("no backend registered".into()))?;
        let mut guard = backend
            .lock()
            .map_err(|_| TickError::DetectorUnavailable("backend lock poisoned".into()))?;
        let detections = guard
            .detect(frame)
            .map_err(|e| TickError::DetectorUnavailable(format!("{}: {:#}", guard.name(), e)))?;
        Ok(DetectionSample::new(
            detections,
            frame.width(),
            frame.height(),
            captured_at,
        ))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedBackend;
    use crate::detect::{BoundingBox, Detection};

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
            Err(anyhow!("model not loaded"))
        }
    }

    #[test]
    fn infer_without_backend_is_unavailable() {
        let registry = BackendRegistry::new();
        let frame = RgbImage::new(4, 4);
        let err = registry.infer(&frame, Duration::ZERO).unwrap_err();
        assert!(matches!(err, TickError::DetectorUnavailable(_)));
    }

    #[test]
    fn backend_error_maps_to_unavailable() {
        let mut registry = BackendRegistry::new();
        registry.register(FailingBackend);
        let frame = RgbImage::new(4, 4);
        let err = registry.infer(&frame, Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn first_registered_is_default_and_can_be_changed() {
        let mut registry = BackendRegistry::new();
        let bbox = BoundingBox::new(1.0, 1.0, 3.0, 3.0);
        registry.register(ScriptedBackend::new(vec![vec![Detection::new(
            "fallen", 0.9, bbox,
        )]]));
        registry.register(FailingBackend);
        assert_eq!(registry.list(), vec!["failing", "scripted"]);

        let frame = RgbImage::new(8, 6);
        let sample = registry
            .infer(&frame, Duration::from_millis(40))
            .expect("scripted sample");
        assert_eq!(sample.detections.len(), 1);
        assert_eq!((sample.width, sample.height), (8, 6));
        assert_eq!(sample.captured_at, Duration::from_millis(40));

        registry.set_default("failing").unwrap();
        assert!(registry.infer(&frame, Duration::ZERO).is_err());
        assert!(registry.set_default("missing").is_err());
    }
}
