#![forbid(unsafe_code)]

//! Time sources for timer-driven scheduling.
//!
//! Production code reads the wall clock. Tests hand the runtime a
//! [`LabClock`] and move time forward explicitly, so flushes and collection
//! sweeps fire at exactly reproducible points.

use std::cell::Cell;
use std::rc::Rc;

use web_time::{Duration, Instant};

/// A manually-advanceable clock for deterministic tests.
///
/// All clones share the same offset, so a test can keep one handle and give
/// another to the runtime.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Rc<Cell<u64>>,
}

impl LabClock {
    /// Create a new lab clock starting at `Instant::now()`.
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

    /// Move the clock forward to `at`. Earlier instants are ignored; lab time
    /// never runs backwards.
    pub fn advance_to(&self, at: Instant) {
        let delta = at.saturating_duration_since(self.now());
        self.advance(delta);
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + Duration::from_micros(self.offset_us.get())
    }

    /// Total time advanced since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.get())
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the runtime reads "now" from.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Real wall-clock time.
    #[default]
    Real,
    /// Deterministic lab clock.
    Lab(LabClock),
}

impl Clock {
    /// A clock backed by a fresh [`LabClock`].
    #[must_use]
    pub fn lab() -> (Self, LabClock) {
        let lab = LabClock::new();
        (Self::Lab(lab.clone()), lab)
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(lab) => lab.now(),
        }
    }

    /// The lab clock, if this clock can be driven manually.
    #[must_use]
    pub fn as_lab(&self) -> Option<&LabClock> {
        match self {
            Self::Real => None,
            Self::Lab(lab) => Some(lab),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_clock_only_moves_when_advanced() {
        let lab = LabClock::new();
        let t0 = lab.now();
        assert_eq!(lab.now(), t0);
        lab.advance(Duration::from_millis(250));
        assert_eq!(lab.now() - t0, Duration::from_millis(250));
        assert_eq!(lab.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn clones_share_time() {
        let (clock, lab) = Clock::lab();
        let before = clock.now();
        lab.advance(Duration::from_secs(1));
        assert_eq!(clock.now() - before, Duration::from_secs(1));
        assert!(clock.as_lab().is_some());
    }

    #[test]
    fn advance_to_never_rewinds() {
        let lab = LabClock::new();
        let start = lab.now();
        lab.advance(Duration::from_millis(10));
        lab.advance_to(start);
        assert_eq!(lab.elapsed(), Duration::from_millis(10));
        lab.advance_to(start + Duration::from_millis(40));
        assert_eq!(lab.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn real_clock_is_not_controllable() {
        let clock = Clock::default();
        assert!(clock.as_lab().is_none());
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
