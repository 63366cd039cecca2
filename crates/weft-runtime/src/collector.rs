#![forbid(unsafe_code)]

//! Liveness collector.
//!
//! Bindings and listeners are never unsubscribed explicitly. Instead, every
//! state that gains a subscriber is queued here, and a periodic sweep drops
//! subscribers whose anchor node is no longer attached to the document. The
//! sweep timer only exists while something is queued.
//!
//! Candidates are held weakly: a queued sweep never keeps a cell, or the
//! runtime it points back to, alive.

use std::rc::{Rc, Weak};

use ahash::AHashSet;
use weft_core::UiNode;

use crate::diagnostics::Counters;
use crate::runtime::Runtime;
use crate::state::{StateId, Tracked};
use crate::timer::Task;

/// States queued for the next sweep, deduplicated by [`StateId`].
pub(crate) struct Candidates<N: UiNode> {
    states: Vec<Weak<dyn Tracked<N>>>,
    ids: AHashSet<StateId>,
}

impl<N: UiNode> Default for Candidates<N> {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            ids: AHashSet::new(),
        }
    }
}

impl<N: UiNode> Candidates<N> {
    fn insert(&mut self, state: &Rc<dyn Tracked<N>>) {
        if self.ids.insert(state.id()) {
            self.states.push(Rc::downgrade(state));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }
}

impl<N: UiNode> Runtime<N> {
    /// Queue `state` for the next sweep, arming the sweep timer if this is
    /// the first candidate since the last one. Re-queuing is idempotent.
    pub(crate) fn schedule_collect(&self, state: &Rc<dyn Tracked<N>>) {
        let mut candidates = self.inner.gc_candidates.borrow_mut();
        let set = candidates.get_or_insert_with(|| {
            self.schedule(Task::Collect, self.inner.config.gc_interval);
            Candidates::default()
        });
        set.insert(state);
    }

    pub(crate) fn collect_garbage(&self) {
        let Some(candidates) = self.inner.gc_candidates.borrow_mut().take() else {
            return;
        };
        let pruned: usize = candidates
            .states
            .iter()
            .filter_map(Weak::upgrade)
            .map(|state| state.collect())
            .sum();
        let counters = &self.inner.counters;
        Counters::bump(&counters.collections, 1);
        Counters::bump(&counters.pruned_subscriptions, pruned as u64);
        tracing::debug!(
            message = "weft.collect",
            states = candidates.len(),
            pruned
        );
    }

    /// Whether a liveness sweep is armed.
    #[must_use]
    pub fn has_pending_collection(&self) -> bool {
        self.inner.gc_candidates.borrow().is_some()
    }
}
