#![forbid(unsafe_code)]

//! Reactive state cells.
//!
//! A [`State<T>`] holds two values: `raw`, which changes the moment
//! [`set`](State::set) is called, and `old`, the value as of the last
//! completed update cycle. The gap between them is what the scheduler
//! processes.
//!
//! # Invariants
//!
//! 1. `raw` changes synchronously on `set`; `old` only changes when a flush
//!    commits, except for cells nobody observes, which commit immediately.
//! 2. Setting a value equal (`PartialEq`) to `raw` does nothing: no flush is
//!    scheduled and `old` is untouched.
//! 3. Subscribers are kept in registration order.
//! 4. A derivation created outside any render is owned by its target cell;
//!    its sources only hold it weakly. Dropping every handle to the target
//!    ends the derivation.
//!
//! # Failure Modes
//!
//! - Calling `set` on a cell from inside its own [`with`](State::with)
//!   closure panics on the inner `RefCell` borrow.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use weft_core::{Node, UiNode};

use crate::binding::Binding;
use crate::derive::{AnyListener, ListenerRef};
use crate::runtime::Runtime;

/// Runtime-unique identifier of a state cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u64);

impl StateId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The scheduler's view of a state cell, independent of the value type.
pub(crate) trait Tracked<N: UiNode> {
    fn id(&self) -> StateId;

    /// `raw != old`: the cell changed since the last commit.
    fn is_dirty(&self) -> bool;

    /// `old := raw`.
    fn commit(&self);

    /// Drop bindings whose node left the tree and return the survivors.
    fn live_bindings(&self) -> Vec<Rc<Binding<N>>>;

    /// Drop listeners whose anchor left the tree and return the survivors.
    fn live_listeners(&self) -> Vec<Rc<dyn AnyListener<N>>>;

    fn subscribe_binding(&self, binding: Rc<Binding<N>>);

    fn subscribe_listener(&self, listener: ListenerRef<N>);

    /// Prune both subscriber lists; returns how many entries were removed.
    fn collect(&self) -> usize;
}

struct StateInner<T, N: UiNode> {
    id: StateId,
    runtime: Runtime<N>,
    raw: RefCell<T>,
    old: RefCell<T>,
    bindings: RefCell<Vec<Rc<Binding<N>>>>,
    listeners: RefCell<Vec<ListenerRef<N>>>,
    /// Derivations writing into this cell that nothing else keeps alive.
    owned: RefCell<Vec<Rc<dyn AnyListener<N>>>>,
}

impl<T: Clone + PartialEq + 'static, N: UiNode> Tracked<N> for StateInner<T, N> {
    fn id(&self) -> StateId {
        self.id
    }

    fn is_dirty(&self) -> bool {
        *self.raw.borrow() != *self.old.borrow()
    }

    fn commit(&self) {
        let raw = self.raw.borrow().clone();
        *self.old.borrow_mut() = raw;
    }

    fn live_bindings(&self) -> Vec<Rc<Binding<N>>> {
        let mut bindings = self.bindings.borrow_mut();
        bindings.retain(|b| b.is_live());
        bindings.clone()
    }

    fn live_listeners(&self) -> Vec<Rc<dyn AnyListener<N>>> {
        let mut live = Vec::new();
        self.listeners
            .borrow_mut()
            .retain(|link| match link.upgrade() {
                Some(listener) if listener.is_live() => {
                    live.push(listener);
                    true
                }
                _ => false,
            });
        live
    }

    fn subscribe_binding(&self, binding: Rc<Binding<N>>) {
        self.bindings.borrow_mut().push(binding);
    }

    fn subscribe_listener(&self, listener: ListenerRef<N>) {
        self.listeners.borrow_mut().push(listener);
    }

    fn collect(&self) -> usize {
        let before = self.bindings.borrow().len() + self.listeners.borrow().len();
        let after = self.live_bindings().len() + self.live_listeners().len();
        before - after
    }
}

/// A reactive value cell.
///
/// Cloning a `State` creates a new handle to the **same** cell.
pub struct State<T, N: UiNode = Node> {
    inner: Rc<StateInner<T, N>>,
}

/// Non-owning handle to a state cell.
pub(crate) struct WeakState<T, N: UiNode = Node> {
    inner: Weak<StateInner<T, N>>,
}

impl<T, N: UiNode> WeakState<T, N> {
    pub(crate) fn upgrade(&self) -> Option<State<T, N>> {
        self.inner.upgrade().map(|inner| State { inner })
    }
}

impl<T, N: UiNode> Clone for State<T, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug, N: UiNode> fmt::Debug for State<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.inner.id.raw())
            .field("raw", &*self.inner.raw.borrow())
            .field("old", &*self.inner.old.borrow())
            .field("bindings", &self.inner.bindings.borrow().len())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static, N: UiNode> State<T, N> {
    pub(crate) fn new(runtime: &Runtime<N>, initial: T) -> Self {
        Self {
            inner: Rc::new(StateInner {
                id: runtime.next_state_id(),
                runtime: runtime.clone(),
                raw: RefCell::new(initial.clone()),
                old: RefCell::new(initial),
                bindings: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                owned: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn erased(&self) -> Rc<dyn Tracked<N>> {
        self.inner.clone()
    }

    pub(crate) fn downgrade(&self) -> WeakState<T, N> {
        WeakState {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn own_listener(&self, listener: Rc<dyn AnyListener<N>>) {
        self.inner.owned.borrow_mut().push(listener);
    }

    /// Give up ownership of the listener at `ptr`, if this cell holds it.
    pub(crate) fn release_listener(&self, ptr: *const ()) {
        let mut owned = self.inner.owned.borrow_mut();
        let Some(idx) = owned
            .iter()
            .position(|l| Rc::as_ptr(l).cast::<()>() == ptr)
        else {
            return;
        };
        let released = owned.remove(idx);
        drop(owned);
        drop(released);
    }

    #[must_use]
    pub fn id(&self) -> StateId {
        self.inner.id
    }

    /// The runtime this cell schedules its updates on.
    #[must_use]
    pub fn runtime(&self) -> &Runtime<N> {
        &self.inner.runtime
    }

    /// Current value. Inside a tracked call, records this cell as a
    /// dependency.
    #[must_use]
    pub fn get(&self) -> T {
        self.track_read();
        self.inner.raw.borrow().clone()
    }

    /// Borrow the current value without cloning. Tracked like [`get`](Self::get).
    ///
    /// # Panics
    ///
    /// Panics if `f` sets this same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track_read();
        f(&self.inner.raw.borrow())
    }

    /// Value as of the last completed update cycle. Tracked like
    /// [`get`](Self::get).
    #[must_use]
    pub fn old(&self) -> T {
        self.track_read();
        self.inner.old.borrow().clone()
    }

    #[must_use]
    pub fn get_untracked(&self) -> T {
        self.inner.raw.borrow().clone()
    }

    #[must_use]
    pub fn old_untracked(&self) -> T {
        self.inner.old.borrow().clone()
    }

    /// Assign a new value.
    ///
    /// Equal values are ignored. An observed cell joins the pending batch and
    /// a flush is scheduled; an unobserved cell commits `old` on the spot.
    pub fn set(&self, value: T) {
        let runtime = &self.inner.runtime;
        runtime.record_set(self.inner.id, || self.erased());
        if *self.inner.raw.borrow() == value {
            return;
        }
        let _previous = self.inner.raw.replace(value);
        if self.has_subscribers() {
            runtime.mark_changed(self.erased());
        } else {
            self.inner.commit();
        }
    }

    /// `set(f(&current))`.
    ///
    /// `f` sees a snapshot; it may read or set this cell, and its result
    /// overwrites whatever it set.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.inner.raw.borrow().clone();
        self.set(f(&current));
    }

    /// Registered bindings, including ones not yet pruned.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    /// Registered listeners, including ones not yet pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn owned_listener_count(&self) -> usize {
        self.inner.owned.borrow().len()
    }

    fn has_subscribers(&self) -> bool {
        self.binding_count() + self.listener_count() > 0
    }

    fn track_read(&self) {
        self.inner
            .runtime
            .record_get(self.inner.id, || self.erased());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::LabClock;

    use crate::config::RuntimeConfig;

    fn lab_runtime() -> Runtime {
        Runtime::with_config(RuntimeConfig::lab(&LabClock::new()))
    }

    #[test]
    fn unobserved_set_commits_immediately() {
        let rt = lab_runtime();
        let s = rt.state(1);
        s.set(2);
        assert_eq!(s.get(), 2);
        assert_eq!(s.old(), 2);
        assert!(!rt.has_pending_flush());
    }

    #[test]
    fn equal_set_is_a_noop() {
        let rt = lab_runtime();
        let s = rt.state(String::from("same"));
        let source = s.clone();
        let _len = rt.derive(move || source.get().len());
        assert_eq!(s.listener_count(), 1);

        s.set(String::from("same"));
        assert!(!rt.has_pending_flush());
        assert_eq!(s.old_untracked(), "same");
    }

    #[test]
    fn observed_set_defers_commit() {
        let rt = lab_runtime();
        let s = rt.state(1);
        let source = s.clone();
        let doubled = rt.derive(move || source.get() * 2);
        assert_eq!(s.listener_count(), 1);

        s.set(5);
        assert_eq!(s.get_untracked(), 5);
        assert_eq!(s.old_untracked(), 1);
        assert!(rt.has_pending_flush());

        rt.settle().expect("settle");
        assert_eq!(s.old_untracked(), 5);
        assert_eq!(doubled.get_untracked(), 10);
    }

    #[test]
    fn update_applies_function() {
        let rt = lab_runtime();
        let s = rt.state(vec![1, 2]);
        s.update(|v| {
            let mut v = v.clone();
            v.push(3);
            v
        });
        assert_eq!(s.get(), vec![1, 2, 3]);
        s.with(|v| assert_eq!(v.len(), 3));
    }

    #[test]
    fn update_may_set_the_same_cell() {
        let rt = lab_runtime();
        let s = rt.state(1);
        let inner = s.clone();
        s.update(|v| {
            inner.set(v + 100);
            v + 1
        });
        assert_eq!(s.get(), 2);
    }

    #[test]
    fn clones_share_the_cell() {
        let rt = lab_runtime();
        let a = rt.state(0);
        let b = a.clone();
        b.set(9);
        assert_eq!(a.get(), 9);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn ids_are_unique_per_runtime() {
        let rt = lab_runtime();
        let a = rt.state(0);
        let b = rt.state(0);
        assert_ne!(a.id(), b.id());
        assert!(b.id().raw() > a.id().raw());
    }

    #[test]
    fn debug_shows_both_values() {
        let rt = lab_runtime();
        let s = rt.state(7);
        let dbg = format!("{s:?}");
        assert!(dbg.contains("State"));
        assert!(dbg.contains("raw: 7"));
        assert!(dbg.contains("old: 7"));
    }
}
