use anyhow::Result;
use image::RgbImage;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// Backends map a decoded RGB frame to detections in that frame's pixel space.
/// They are external collaborators of the alert pipeline: the pipeline only
/// consumes their output and treats any error as "no signal" for the tick.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations must not retain the frame beyond this call.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
