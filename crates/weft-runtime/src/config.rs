#![forbid(unsafe_code)]

//! Runtime configuration.

use weft_core::clock::{Clock, LabClock};
use web_time::Duration;

/// Upper bound on derivation passes per flush.
///
/// A derivation graph that is still producing changes after this many passes
/// is treated as cyclic: the derivation phase is abandoned and a
/// [`ReactiveError::CascadeOverflow`](crate::ReactiveError::CascadeOverflow)
/// is reported.
pub const MAX_DERIVATION_CASCADE: usize = 100;

/// Default period of the liveness collector.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay between the first mutation of a tick and the flush that
    /// processes it. Default: zero (flush on the next tick).
    pub flush_delay: Duration,

    /// Period of the liveness collector. A sweep is only scheduled while at
    /// least one state is waiting for collection. Default: 1000ms.
    pub gc_interval: Duration,

    /// Maximum number of `tick()` rounds a single `settle()` will run before
    /// giving up on a self-rescheduling workload. Default: 1000.
    pub max_settle_rounds: usize,

    /// Number of recent errors kept for [`drain_errors`](crate::Runtime::drain_errors).
    /// Oldest entries are dropped first. Default: 64.
    pub error_log_capacity: usize,

    /// Time source. Default: [`Clock::Real`].
    pub clock: Clock,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::ZERO,
            gc_interval: DEFAULT_GC_INTERVAL,
            max_settle_rounds: 1000,
            error_log_capacity: 64,
            clock: Clock::Real,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration driven by a lab clock.
    #[must_use]
    pub fn lab(lab: &LabClock) -> Self {
        Self::default().with_clock(Clock::Lab(lab.clone()))
    }

    #[must_use]
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_settle_rounds(mut self, rounds: usize) -> Self {
        self.max_settle_rounds = rounds.max(1);
        self
    }

    #[must_use]
    pub fn with_error_log_capacity(mut self, capacity: usize) -> Self {
        self.error_log_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.flush_delay, Duration::ZERO);
        assert_eq!(config.gc_interval, Duration::from_millis(1000));
        assert_eq!(config.max_settle_rounds, 1000);
        assert_eq!(config.error_log_capacity, 64);
        assert!(config.clock.as_lab().is_none());
    }

    #[test]
    fn builders_override() {
        let lab = LabClock::new();
        let config = RuntimeConfig::lab(&lab)
            .with_gc_interval(Duration::from_millis(50))
            .with_flush_delay(Duration::from_millis(5))
            .with_max_settle_rounds(0)
            .with_error_log_capacity(2);
        assert_eq!(config.gc_interval, Duration::from_millis(50));
        assert_eq!(config.flush_delay, Duration::from_millis(5));
        assert_eq!(config.max_settle_rounds, 1);
        assert_eq!(config.error_log_capacity, 2);
        assert!(config.clock.as_lab().is_some());
    }
}
