#![forbid(unsafe_code)]

//! The runtime handle and the host-facing driving API.
//!
//! A [`Runtime`] owns every piece of scheduler state: the current dependency
//! set, the pending-change batch, the collector queue, and the timer queue.
//! Handles are cheap to clone and all clones share that state.
//!
//! Nothing happens in the background. The host calls [`Runtime::tick`] once
//! per turn of its event loop (or [`Runtime::settle`] to run to quiescence),
//! and can sleep until [`Runtime::next_deadline`]. Tests use a
//! [`LabClock`](weft_core::LabClock) and [`Runtime::advance`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use weft_core::{Node, UiNode};
use web_time::{Duration, Instant};

use crate::collector::Candidates;
use crate::config::RuntimeConfig;
use crate::derive::AnyListener;
use crate::diagnostics::{Counters, Diagnostics, ErrorLog};
use crate::error::{ReactiveError, Result};
use crate::state::{State, StateId};
use crate::timer::{Task, TimerQueue};
use crate::tracker::{DepSet, StateSet};

pub(crate) struct RuntimeInner<N: UiNode> {
    pub(crate) config: RuntimeConfig,
    next_state_id: Cell<u64>,
    /// Dependencies of the tracked call in progress, if any.
    pub(crate) current_deps: RefCell<Option<DepSet<N>>>,
    /// Derivations created by the render in progress, awaiting its node.
    pub(crate) new_derives: RefCell<Option<Vec<Rc<dyn AnyListener<N>>>>>,
    /// Observed states mutated since the last flush.
    pub(crate) changed: RefCell<Option<StateSet<N>>>,
    /// States written during the current derivation pass.
    pub(crate) derived: RefCell<Option<StateSet<N>>>,
    /// States waiting for a liveness sweep.
    pub(crate) gc_candidates: RefCell<Option<Candidates<N>>>,
    pub(crate) timers: RefCell<TimerQueue>,
    pub(crate) flushing: Cell<bool>,
    pub(crate) counters: Counters,
    pub(crate) errors: RefCell<ErrorLog>,
}

/// Handle to a reactive runtime.
///
/// `Runtime` is `!Send`: states, bindings, and nodes are all tied to the
/// thread that created them.
pub struct Runtime<N: UiNode = Node> {
    pub(crate) inner: Rc<RuntimeInner<N>>,
}

impl<N: UiNode> Clone for Runtime<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<N: UiNode> fmt::Debug for Runtime<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("pending_flush", &self.has_pending_flush())
            .field("pending_collection", &self.has_pending_collection())
            .field("timers", &self.inner.timers.borrow().len())
            .field("flushing", &self.inner.flushing.get())
            .finish_non_exhaustive()
    }
}

impl Runtime<Node> {
    /// Runtime over the in-memory [`Node`] tree with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::for_host(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::for_host(config)
    }
}

impl Default for Runtime<Node> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: UiNode> Runtime<N> {
    /// Runtime over any host node type.
    #[must_use]
    pub fn for_host(config: RuntimeConfig) -> Self {
        let errors = ErrorLog::new(config.error_log_capacity);
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                next_state_id: Cell::new(0),
                current_deps: RefCell::new(None),
                new_derives: RefCell::new(None),
                changed: RefCell::new(None),
                derived: RefCell::new(None),
                gc_candidates: RefCell::new(None),
                timers: RefCell::new(TimerQueue::default()),
                flushing: Cell::new(false),
                counters: Counters::default(),
                errors: RefCell::new(errors),
            }),
        }
    }

    /// Create a state cell owned by this runtime.
    pub fn state<T: Clone + PartialEq + 'static>(&self, initial: T) -> State<T, N> {
        State::new(self, initial)
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn next_state_id(&self) -> StateId {
        let id = self.inner.next_state_id.get();
        self.inner.next_state_id.set(id + 1);
        StateId::new(id)
    }

    /// Current time on the configured clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.config.clock.now()
    }

    pub(crate) fn schedule(&self, task: Task, delay: Duration) {
        let at = self.now() + delay;
        self.inner.timers.borrow_mut().schedule(at, task);
    }

    /// Earliest pending deadline, for hosts that sleep between ticks.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.timers.borrow().next_deadline()
    }

    /// Run every task that is due now and was queued before this call.
    ///
    /// Work scheduled by those tasks (a mutation made during a render, say)
    /// waits for the next tick. Returns the number of tasks run.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::ReentrantFlush`] when called from inside a flush.
    pub fn tick(&self) -> Result<usize> {
        if self.inner.flushing.get() {
            return Err(ReactiveError::ReentrantFlush);
        }
        let now = self.now();
        let horizon = self.inner.timers.borrow().next_seq();
        let mut ran = 0;
        loop {
            let task = self.inner.timers.borrow_mut().pop_due(now, horizon);
            let Some(task) = task else {
                break;
            };
            self.run_task(task);
            ran += 1;
        }
        Ok(ran)
    }

    /// Tick until nothing is due, at most `max_settle_rounds` times.
    ///
    /// # Errors
    ///
    /// As [`tick`](Self::tick).
    pub fn settle(&self) -> Result<usize> {
        let mut total = 0;
        for _ in 0..self.inner.config.max_settle_rounds {
            let ran = self.tick()?;
            if ran == 0 {
                return Ok(total);
            }
            total += ran;
        }
        tracing::warn!(
            message = "weft.settle_exhausted",
            rounds = self.inner.config.max_settle_rounds,
            tasks = total
        );
        Ok(total)
    }

    /// Move a lab clock forward by `delta`, firing every task at its deadline
    /// along the way.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::ClockNotControllable`] when the runtime reads the
    /// real clock; otherwise as [`tick`](Self::tick).
    pub fn advance(&self, delta: Duration) -> Result<usize> {
        let Some(lab) = self.inner.config.clock.as_lab().cloned() else {
            return Err(ReactiveError::ClockNotControllable);
        };
        let target = lab.now() + delta;
        let mut ran = self.settle()?;
        while let Some(deadline) = self.next_deadline().filter(|at| *at <= target) {
            lab.advance_to(deadline);
            ran += self.settle()?;
            // settle gave up with work still due; stop rather than spin.
            if self.next_deadline().is_some_and(|at| at <= lab.now()) {
                break;
            }
        }
        lab.advance_to(target);
        ran += self.settle()?;
        Ok(ran)
    }

    fn run_task(&self, task: Task) {
        match task {
            Task::Flush => {
                if let Err(err) = self.update_all() {
                    self.report(err);
                }
            }
            Task::Collect => self.collect_garbage(),
        }
    }

    pub(crate) fn record_render_failure(&self, err: ReactiveError) {
        Counters::bump(&self.inner.counters.render_failures, 1);
        self.report(err);
    }

    pub(crate) fn report(&self, err: ReactiveError) {
        self.inner.errors.borrow_mut().push(err);
    }

    /// Snapshot of the runtime's counters.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let c = &self.inner.counters;
        Diagnostics {
            flushes: c.flushes.get(),
            derivations: c.derivations.get(),
            renders: c.renders.get(),
            render_failures: c.render_failures.get(),
            cascade_overflows: c.cascade_overflows.get(),
            collections: c.collections.get(),
            pruned_subscriptions: c.pruned_subscriptions.get(),
            dropped_errors: self.inner.errors.borrow().dropped(),
        }
    }

    /// Take every logged error, oldest first.
    pub fn drain_errors(&self) -> Vec<ReactiveError> {
        self.inner.errors.borrow_mut().drain()
    }

    /// Drop all pending work, counters, and logged errors.
    ///
    /// Existing states keep their values and subscribers, but mutations that
    /// were waiting for a flush are forgotten: their `old` values stay as
    /// they were until the next change.
    pub fn reset(&self) {
        *self.inner.changed.borrow_mut() = None;
        *self.inner.derived.borrow_mut() = None;
        *self.inner.gc_candidates.borrow_mut() = None;
        self.inner.timers.borrow_mut().clear();
        self.inner.counters.reset();
        self.inner.errors.borrow_mut().clear();
    }
}
