#![forbid(unsafe_code)]

//! Counters and the bounded error log.
//!
//! Failures inside render functions and runaway derivation cascades never
//! propagate to the code that mutated state. They land here instead, next to
//! the tracing events emitted at the point of failure.

use std::cell::Cell;
use std::collections::VecDeque;

use crate::error::ReactiveError;

/// Point-in-time copy of the runtime's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    /// Completed update flushes.
    pub flushes: u64,
    /// Derivations re-run by flushes.
    pub derivations: u64,
    /// Bindings re-rendered by flushes.
    pub renders: u64,
    /// Tracked calls that panicked.
    pub render_failures: u64,
    /// Flushes whose derivation phase hit the cascade cap.
    pub cascade_overflows: u64,
    /// Liveness sweeps.
    pub collections: u64,
    /// Stale bindings and listeners removed by sweeps.
    pub pruned_subscriptions: u64,
    /// Errors dropped from the log because it was full.
    pub dropped_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) flushes: Cell<u64>,
    pub(crate) derivations: Cell<u64>,
    pub(crate) renders: Cell<u64>,
    pub(crate) render_failures: Cell<u64>,
    pub(crate) cascade_overflows: Cell<u64>,
    pub(crate) collections: Cell<u64>,
    pub(crate) pruned_subscriptions: Cell<u64>,
}

impl Counters {
    pub(crate) fn bump(counter: &Cell<u64>, by: u64) {
        counter.set(counter.get().saturating_add(by));
    }

    pub(crate) fn reset(&self) {
        for c in [
            &self.flushes,
            &self.derivations,
            &self.renders,
            &self.render_failures,
            &self.cascade_overflows,
            &self.collections,
            &self.pruned_subscriptions,
        ] {
            c.set(0);
        }
    }
}

/// Ring of the most recent errors.
#[derive(Debug)]
pub(crate) struct ErrorLog {
    entries: VecDeque<ReactiveError>,
    capacity: usize,
    dropped: u64,
}

impl ErrorLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            dropped: 0,
        }
    }

    pub(crate) fn push(&mut self, error: ReactiveError) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(error);
    }

    pub(crate) fn drain(&mut self) -> Vec<ReactiveError> {
        self.entries.drain(..).collect()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}
