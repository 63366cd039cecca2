#![forbid(unsafe_code)]

//! Automatic dependency capture.
//!
//! While a function runs under [`Runtime::run_tracked`], every tracked read
//! of a [`State`](crate::State) lands in the current [`DepSet`]'s getters and
//! every write lands in its setters. Exactly one set is current at a time;
//! nested tracked calls save and restore the outer one, so a derivation
//! created inside a binding captures its own reads only.
//!
//! A panic inside the tracked function is caught and reported instead of
//! unwinding into the scheduler: one bad binding cannot abort a flush.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use ahash::AHashSet;
use weft_core::UiNode;

use crate::error::ReactiveError;
use crate::runtime::Runtime;
use crate::state::{StateId, Tracked};

/// Insertion-ordered set of type-erased states, keyed by [`StateId`].
pub(crate) struct StateSet<N: UiNode> {
    order: Vec<Rc<dyn Tracked<N>>>,
    ids: AHashSet<StateId>,
}

impl<N: UiNode> Default for StateSet<N> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            ids: AHashSet::new(),
        }
    }
}

impl<N: UiNode> StateSet<N> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert `state`; returns `false` if it was already present.
    pub(crate) fn insert(&mut self, state: Rc<dyn Tracked<N>>) -> bool {
        if !self.ids.insert(state.id()) {
            return false;
        }
        self.order.push(state);
        true
    }

    pub(crate) fn contains(&self, id: StateId) -> bool {
        self.ids.contains(&id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Rc<dyn Tracked<N>>> {
        self.order.iter()
    }

    pub(crate) fn to_vec(&self) -> Vec<Rc<dyn Tracked<N>>> {
        self.order.clone()
    }

    pub(crate) fn into_vec(self) -> Vec<Rc<dyn Tracked<N>>> {
        self.order
    }
}

/// Reads and writes captured during one tracked call.
pub(crate) struct DepSet<N: UiNode> {
    pub(crate) getters: StateSet<N>,
    pub(crate) setters: StateSet<N>,
}

impl<N: UiNode> Default for DepSet<N> {
    fn default() -> Self {
        Self {
            getters: StateSet::new(),
            setters: StateSet::new(),
        }
    }
}

impl<N: UiNode> DepSet<N> {
    /// Getters that are not also setters, in first-read order.
    ///
    /// A function that reads and writes the same state does not subscribe to
    /// it; otherwise every run would schedule the next one.
    pub(crate) fn subscriptions(&self) -> impl Iterator<Item = &Rc<dyn Tracked<N>>> {
        self.getters
            .iter()
            .filter(|state| !self.setters.contains(state.id()))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl<N: UiNode> Runtime<N> {
    /// Run `f` with a fresh dependency set installed, returning its result
    /// (or `None` if it panicked) and the captured dependencies.
    pub(crate) fn run_tracked<R>(&self, f: impl FnOnce() -> R) -> (Option<R>, DepSet<N>) {
        let outer = self.inner.current_deps.replace(Some(DepSet::default()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        let deps = self
            .inner
            .current_deps
            .replace(outer)
            .unwrap_or_default();
        match outcome {
            Ok(value) => (Some(value), deps),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(message = "weft.render_failed", panic = %message);
                self.record_render_failure(ReactiveError::render_panicked(message));
                (None, deps)
            }
        }
    }

    /// Run `f` with tracking suspended. Reads inside `f` subscribe nothing.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let outer = self.inner.current_deps.replace(None);
        let out = panic::catch_unwind(AssertUnwindSafe(f));
        self.inner.current_deps.replace(outer);
        match out {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Whether a tracked call is currently capturing dependencies.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.inner.current_deps.borrow().is_some()
    }

    pub(crate) fn record_get(&self, id: StateId, state: impl FnOnce() -> Rc<dyn Tracked<N>>) {
        if let Some(deps) = self.inner.current_deps.borrow_mut().as_mut()
            && !deps.getters.contains(id)
        {
            deps.getters.insert(state());
        }
    }

    pub(crate) fn record_set(&self, id: StateId, state: impl FnOnce() -> Rc<dyn Tracked<N>>) {
        if let Some(deps) = self.inner.current_deps.borrow_mut().as_mut()
            && !deps.setters.contains(id)
        {
            deps.setters.insert(state());
        }
    }
}
