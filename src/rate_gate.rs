//! Leaky-bucket-of-one rate gate shared by actuator debounce and log throttling.

use std::time::Duration;

use tokio::time::Instant;

/// What the very first check after construction answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstCheck {
    /// First check is refused (actuators never flip on the first decision).
    Block,
    /// First check is granted (the first log record is always written).
    Allow,
}

/// Grants at most one permit per interval.
///
/// The first check only seeds the timer. Every later check compares the time
/// elapsed since the last granted permit against `interval`: at or below it the
/// check is refused, above it the check is granted and the timer restarts.
/// Checking consumes the permit whether or not the caller acts on it.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
    first: FirstCheck,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(interval: Duration, first: FirstCheck) -> Self {
        Self {
            interval,
            first,
            last: None,
        }
    }

    /// Returns true when an action is permitted at `now`.
    pub fn permit(&mut self, now: Instant) -> bool {
        let Some(last) = self.last else {
            self.last = Some(now);
            return self.first == FirstCheck::Allow;
        };

        if now.saturating_duration_since(last) <= self.interval {
            return false;
        }

        self.last = Some(now);
        true
    }

    /// Instant of the last granted (or seeding) check.
    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
