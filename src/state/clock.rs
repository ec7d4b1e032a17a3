//! Time source for the scheduler's batch-wait threshold.
//!
//! In production the scheduler reads `web_time::Instant::now()`. Tests use a
//! [`LabClock`], whose time only moves when it is advanced explicitly.

use std::cell::Cell;
use std::rc::Rc;

use web_time::{Duration, Instant};

/// A manually-advanceable clock for deterministic tests.
///
/// Clones share the same offset.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Rc<Cell<u64>>,
}

impl LabClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Rc::new(Cell::new(0)),
        }
    }

    /// Advance the lab clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.set(self.offset_us.get().saturating_add(us));
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + Duration::from_micros(self.offset_us.get())
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the scheduler gets "now" from.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Real wall-clock time.
    #[default]
    Real,
    /// Deterministic lab clock.
    Lab(LabClock),
}

impl Clock {
    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Clock::Real => Instant::now(),
            Clock::Lab(lab) => lab.now(),
        }
    }
}
