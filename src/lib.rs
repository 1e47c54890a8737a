//! Fall alert debouncing and overlay compositing.
//!
//! This crate turns per-frame object detections into a stable fall alert and
//! draws that alert onto the frame.
//!
//! # Pipeline
//!
//! Per frame: detector → `DetectionSample` → `FallPersistenceState::update`
//! → `persistent` → `render::render` → output frame.
//!
//! - `persistence`: the debounce state machine. A fall is reported only after
//!   qualifying detections have been present on every frame for the configured
//!   threshold; one miss restarts the window.
//! - `render`: resolution-independent alert chrome (border, top bar, blinking
//!   warning text, bottom stripes) alpha-blended over the frame, plus boxes.
//! - `session`: one private persistence state per monitored stream, kept in a
//!   registry keyed by session id.
//!
//! # Module Structure
//!
//! - `detect`: detection types, backend trait and registry
//! - `frame` / `ingest`: JPEG boundary and frame sources (not part of the core)
//! - `blink`: caller-owned blink timer for the warning text
//! - `config`: layered file/env configuration

pub mod blink;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod persistence;
pub mod render;
pub mod session;

pub use blink::BlinkClock;
pub use config::{FallwatchConfig, NoSignalPolicy, OverlayProportions, RenderConfig};
pub use detect::{
    BackendRegistry, BoundingBox, ClassSet, Detection, DetectionSample, DetectorBackend,
    ScriptedBackend,
};
pub use error::{GeometryError, TickError};
pub use frame::{decode_jpeg, encode_jpeg, EncodedFrame, Frame};
pub use ingest::{open_source, FrameSource};
pub use persistence::FallPersistenceState;
pub use session::{AlertTransition, Session, SessionRegistry, TickOutcome};
