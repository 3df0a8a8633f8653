//! Deadline countdown.
//!
//! The countdown is wall-clock-based with no internal thread - the caller
//! is responsible for calling `tick()` roughly once per second. Remaining
//! time is recomputed from the absolute deadline on every tick, never
//! decremented from a local counter, so the countdown self-corrects
//! against tick skew and drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle identifying one `start()`. A stale handle can neither
/// tick nor cancel a later countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub remaining_secs: u64,
    /// True exactly once per `start()`, on the tick that reaches zero.
    pub expired: bool,
}

/// Countdown toward an absolute deadline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Countdown {
    deadline: Option<DateTime<Utc>>,
    generation: u64,
    fired: bool,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the countdown. A deadline already in the past is not an
    /// error; the first tick reports expiry.
    pub fn start(&mut self, deadline: DateTime<Utc>) -> TimerHandle {
        self.generation += 1;
        self.deadline = Some(deadline);
        self.fired = false;
        TimerHandle(self.generation)
    }

    /// Disarm, if `handle` belongs to the current start. A cancelled
    /// countdown never ticks or expires afterward.
    pub fn cancel(&mut self, handle: TimerHandle) {
        if handle.0 == self.generation {
            self.deadline = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Seconds until the deadline, floored at zero. `None` when disarmed.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.deadline
            .map(|d| (d - now).num_seconds().max(0) as u64)
    }

    /// Advance against the wall clock. Returns `None` while disarmed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TickOutcome> {
        let remaining_secs = self.remaining_secs(now)?;
        let expired = remaining_secs == 0 && !self.fired;
        if expired {
            self.fired = true;
        }
        Some(TickOutcome {
            remaining_secs,
            expired,
        })
    }
}
