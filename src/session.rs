//! Per-session alert pipeline.
//!
//! Each monitored stream gets its own `Session` with a private
//! `FallPersistenceState`. Sessions live in a `SessionRegistry` keyed by id,
//! are created on `open` and destroyed on `close`. Ticks for one session must
//! be applied in capture order; distinct sessions may run on distinct threads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::blink::BlinkClock;
use crate::config::RenderConfig;
use crate::detect::{BackendRegistry, DetectionSample};
use crate::error::TickError;
use crate::frame::Frame;
use crate::persistence::FallPersistenceState;
use crate::render;

/// Change in the debounced alert, reported once per edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertTransition {
    /// The qualifying run reached the threshold after `elapsed`.
    Raised { elapsed: Duration },
    Cleared,
}

/// Result of one tick.
#[derive(Debug)]
pub struct TickOutcome {
    /// Rendered frame; `None` when the tick had no signal.
    pub frame: Option<RgbImage>,
    pub persistent: bool,
    pub blink_visible: bool,
    pub transition: Option<AlertTransition>,
}

/// Running counters for a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub no_signal_ticks: u64,
    pub alerts_raised: u64,
}

pub struct Session {
    id: String,
    config: RenderConfig,
    state: FallPersistenceState,
    blink: BlinkClock,
    alert_active: bool,
    stats: SessionStats,
}

impl Session {
    pub fn new(id: impl Into<String>, config: RenderConfig, blink_period: Duration) -> Self {
        Self {
            id: id.into(),
            config,
            state: FallPersistenceState::new(),
            blink: BlinkClock::new(blink_period),
            alert_active: false,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn state(&self) -> &FallPersistenceState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    /// Run one tick: detect, update, render.
    ///
    /// `frame` is the outcome of acquiring and decoding this tick's frame. Any
    /// decode or detector failure is handled as "no signal".
    pub fn process(
        &mut self,
        frame: Result<Frame, TickError>,
        detectors: &BackendRegistry,
    ) -> TickOutcome {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => return self.process_no_signal(&err),
        };
        match detectors.infer(&frame.image, frame.captured_at) {
            Ok(sample) => self.process_sample(&frame.image, &sample),
            Err(err) => self.process_no_signal(&err),
        }
    }

    /// Update and render with a sample the caller already has.
    pub fn process_sample(&mut self, image: &RgbImage, sample: &DetectionSample) -> TickOutcome {
        self.stats.ticks += 1;
        let now = sample.captured_at;
        if sample.is_empty() {
            log::trace!("session {}: empty detection set at {:?}", self.id, now);
        }
        let persistent = self.state.update(sample, now, &self.config);
        let transition = self.track_transition(persistent, now);
        let blink_visible = persistent && self.blink.advance(now);
        let rendered = render::render(image, sample, persistent, blink_visible, &self.config);
        TickOutcome {
            frame: Some(rendered),
            persistent,
            blink_visible,
            transition,
        }
    }

    /// Handle a tick that produced no sample.
    pub fn process_no_signal(&mut self, err: &TickError) -> TickOutcome {
        self.stats.ticks += 1;
        self.stats.no_signal_ticks += 1;
        log::warn!(
            "session {}: no signal ({}), policy {:?}",
            self.id,
            err,
            self.config.no_signal
        );
        let persistent = self.state.no_signal(&self.config);
        let now = self.state.last_seen().unwrap_or_default();
        let transition = self.track_transition(persistent, now);
        TickOutcome {
            frame: None,
            persistent,
            blink_visible: persistent && self.blink.visible(),
            transition,
        }
    }

    fn track_transition(&mut self, persistent: bool, now: Duration) -> Option<AlertTransition> {
        match (self.alert_active, persistent) {
            (false, true) => {
                self.alert_active = true;
                self.stats.alerts_raised += 1;
                self.blink.start(now);
                let elapsed = self.state.elapsed();
                log::warn!(
                    "session {}: fall alert raised after {:.2}s",
                    self.id,
                    elapsed.as_secs_f64()
                );
                Some(AlertTransition::Raised { elapsed })
            }
            (true, false) => {
                self.alert_active = false;
                self.blink.stop();
                log::info!("session {}: fall alert cleared", self.id);
                Some(AlertTransition::Cleared)
            }
            _ => None,
        }
    }
}

/// Sessions keyed by id. Each entry is locked independently.
pub struct SessionRegistry {
    sessions: HashMap<String, Arc<Mutex<Session>>>,
    config: RenderConfig,
    blink_period: Duration,
}

impl SessionRegistry {
    pub fn new(config: RenderConfig, blink_period: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
            blink_period,
        }
    }

    /// Create a session with fresh state. Fails if the id is already open.
    pub fn open(&mut self, id: &str) -> Result<Arc<Mutex<Session>>> {
        if self.sessions.contains_key(id) {
            return Err(anyhow!("session '{}' already open", id));
        }
        let session = Arc::new(Mutex::new(Session::new(
            id,
            self.config.clone(),
            self.blink_period,
        )));
        self.sessions.insert(id.to_string(), session.clone());
        log::info!("session {} opened ({} active)", id, self.sessions.len());
        Ok(session)
    }

    /// Destroy a session and its state. Returns false if it was not open.
    pub fn close(&mut self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            log::info!("session {} closed ({} active)", id, self.sessions.len());
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
