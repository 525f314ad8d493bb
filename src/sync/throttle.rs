//! Leading-edge rate limiter for timeline updates.

use std::time::Duration;

use tokio::time::Instant;

/// Lets the first update of each window through and drops the rest.
#[derive(Debug, Clone)]
pub struct TimelineThrottle {
    window: Duration,
    last_emit: Option<Instant>,
}

impl TimelineThrottle {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_emit: None,
        }
    }

    /// Whether an update at `now` may be emitted. Opens a new window if so.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Starts a fresh window at `now` regardless of the current one.
    pub fn force(&mut self, now: Instant) {
        self.last_emit = Some(now);
    }

    /// Lets the next update through immediately.
    pub fn reset(&mut self) {
        self.last_emit = None;
    }
}
