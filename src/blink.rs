use std::time::Duration;

/// Periodic on/off toggle for the warning text, driven by frame timestamps.
///
/// Owned by the caller's loop; the renderer only ever sees the current bool.
/// The clock starts hidden and flips once per `period` while running.
#[derive(Clone, Debug)]
pub struct BlinkClock {
    period: Duration,
    visible: bool,
    last_toggle: Option<Duration>,
}

impl BlinkClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            visible: false,
            last_toggle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.last_toggle.is_some()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Start blinking from `now`, hidden for the first period.
    pub fn start(&mut self, now: Duration) {
        self.visible = false;
        self.last_toggle = Some(now);
    }

    /// Stop blinking and leave the text hidden.
    pub fn stop(&mut self) {
        self.visible = false;
        self.last_toggle = None;
    }

    /// Apply every toggle due up to `now` and return the visibility.
    pub fn advance(&mut self, now: Duration) -> bool {
        let Some(last) = self.last_toggle else {
            return self.visible;
        };
        let Some(since) = now.checked_sub(last) else {
            return self.visible;
        };
        let period = self.period.as_nanos();
        let flips = since.as_nanos() / period;
        if flips > 0 {
            if flips % 2 == 1 {
                self.visible = !self.visible;
            }
            let consumed = u64::try_from(flips * period).unwrap_or(u64::MAX);
            self.last_toggle = Some(last + Duration::from_nanos(consumed));
        }
        self.visible
    }
}

impl Default for BlinkClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
