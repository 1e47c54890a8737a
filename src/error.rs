//! Per-tick failure taxonomy.
//!
//! None of these are fatal. A `TickError` means the tick produced no signal;
//! a `GeometryError` means the renderer hands the frame back without chrome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickError {
    /// The frame source could not produce a valid pixel buffer this tick.
    #[error("frame decode failed: {0}")]
    DecodeFailure(String),
    /// No detector could run on this tick's frame.
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("frame has degenerate dimensions {width}x{height}")]
    DegenerateFrame { width: u32, height: u32 },
}
