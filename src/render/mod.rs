//! Alert overlay compositing.
//!
//! `render` is a pure function of its inputs: the blink flag and the
//! persistence decision are passed in by the caller on every frame.

mod geometry;
mod overlay;
mod text;

pub use geometry::{AlertGeometry, ExclamationMark, InkBounds, PixelRect, WarningLayout};
pub use overlay::{
    render, ALERT_COLOR, ALERT_STROKE, BAR_BASE_COLOR, HIGHLIGHT_COLOR, HIGHLIGHT_STROKE,
    WARNING_TEXT, WARNING_TEXT_COLOR,
};
pub use text::{find_system_font, OverlayFont};
