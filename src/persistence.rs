//! Fall persistence debouncing.
//!
//! A fall is only reported once qualifying detections have been present on
//! every observed frame for at least `RenderConfig::persistence_threshold`.
//! One frame without a qualifying detection restarts the window from zero.

use std::time::Duration;

use crate::config::{NoSignalPolicy, RenderConfig};
use crate::detect::DetectionSample;

/// Debounce state for one monitored session. Never share across sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FallPersistenceState {
    window_start: Option<Duration>,
    last_seen: Option<Duration>,
    persistent: bool,
}

impl FallPersistenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of the current unbroken qualifying run, if any.
    pub fn window_start(&self) -> Option<Duration> {
        self.window_start
    }

    /// Most recent qualifying detection in the current run.
    pub fn last_seen(&self) -> Option<Duration> {
        self.last_seen
    }

    /// Decision from the latest update.
    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// Length of the current run, zero when there is none.
    pub fn elapsed(&self) -> Duration {
        match (self.window_start, self.last_seen) {
            (Some(start), Some(seen)) => seen.saturating_sub(start),
            _ => Duration::ZERO,
        }
    }

    /// Feed one frame's detections captured at `now`.
    ///
    /// `now` must be non-decreasing across calls. A regression is logged and
    /// the elapsed time saturates at zero rather than going negative.
    pub fn update(&mut self, sample: &DetectionSample, now: Duration, config: &RenderConfig) -> bool {
        self.persistent = false;

        let qualifying = sample
            .detections
            .iter()
            .any(|d| config.qualifies(&d.class, d.confidence));

        if !qualifying {
            self.clear();
            return false;
        }

        if let Some(last) = self.last_seen {
            if now < last {
                log::warn!(
                    "persistence update out of order: now={:?} < last_seen={:?}",
                    now,
                    last
                );
            }
        }

        let start = *self.window_start.get_or_insert(now);
        self.last_seen = Some(now);
        self.persistent = now.saturating_sub(start) >= config.persistence_threshold;
        self.persistent
    }

    /// Handle a tick where no sample was produced (decode or detector failure).
    pub fn no_signal(&mut self, config: &RenderConfig) -> bool {
        match config.no_signal {
            NoSignalPolicy::Hold => self.persistent,
            NoSignalPolicy::Reset => {
                self.clear();
                false
            }
        }
    }

    fn clear(&mut self) {
        self.window_start = None;
        self.last_seen = None;
        self.persistent = false;
    }
}
