//! Rate limiting for repeated diagnostics.

use std::time::{Duration, Instant};

/// Lets a diagnostic through at most once per `period`.
#[derive(Debug, Clone)]
pub struct Throttle {
    period: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Creates a throttle that fires on its first check.
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Returns `true` if a message may be emitted at `now`, and if so starts a
    /// new period.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
