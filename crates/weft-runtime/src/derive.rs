#![forbid(unsafe_code)]

//! Derived state.
//!
//! A derivation is a computation whose result is written into a
//! [`State`] instead of the tree, so other derivations and bindings can
//! depend on it in turn. Each run registers a fresh listener on every state
//! it read; the scheduler re-runs listeners of changed states before any
//! binding renders.
//!
//! # Liveness anchors
//!
//! A listener stays subscribed while its anchor is attached:
//!
//! - an explicit node passed to [`Runtime::derive_with`];
//! - otherwise, when created inside a render function, the node that render
//!   produces;
//! - otherwise [`Anchor::Connected`], which never detaches.
//!
//! # Ownership
//!
//! A node-anchored listener is held strongly by its sources and holds its
//! target; the collector drops it once the node leaves the tree. A
//! `Connected` listener is never pruned, so it is owned by its target cell
//! instead and sources keep only a [`Weak`] link. It lives exactly as long
//! as some handle to the target does.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use weft_core::UiNode;

use crate::runtime::Runtime;
use crate::state::{State, WeakState};

/// What keeps a listener alive.
#[derive(Debug, Clone)]
pub(crate) enum Anchor<N> {
    /// Always attached. Used for derivations outside any render.
    Connected,
    Node(N),
}

impl<N: UiNode> Anchor<N> {
    fn is_attached(&self) -> bool {
        match self {
            Self::Connected => true,
            Self::Node(node) => node.is_attached(),
        }
    }
}

/// Type-erased listener, as stored in a state's subscriber list.
pub(crate) trait AnyListener<N: UiNode> {
    fn is_live(&self) -> bool;

    fn set_anchor(&self, anchor: Option<Anchor<N>>);

    /// Re-run the derivation with the same target and anchor, then give up
    /// this listener's anchor. The re-run registers its own listener.
    fn rederive(&self, runtime: &Runtime<N>);
}

/// A listener as stored in a source's subscriber list.
pub(crate) enum ListenerRef<N: UiNode> {
    Strong(Rc<dyn AnyListener<N>>),
    Weak(Weak<dyn AnyListener<N>>),
}

impl<N: UiNode> ListenerRef<N> {
    pub(crate) fn upgrade(&self) -> Option<Rc<dyn AnyListener<N>>> {
        match self {
            Self::Strong(listener) => Some(Rc::clone(listener)),
            Self::Weak(listener) => listener.upgrade(),
        }
    }
}

impl<N: UiNode> Clone for ListenerRef<N> {
    fn clone(&self) -> Self {
        match self {
            Self::Strong(listener) => Self::Strong(Rc::clone(listener)),
            Self::Weak(listener) => Self::Weak(Weak::clone(listener)),
        }
    }
}

enum Target<T, N: UiNode> {
    Held(State<T, N>),
    /// The target owns the listener.
    Owner(WeakState<T, N>),
}

struct Listener<T, N: UiNode> {
    compute: Rc<dyn Fn() -> T>,
    target: Target<T, N>,
    anchor: RefCell<Option<Anchor<N>>>,
}

impl<T, N: UiNode> Listener<T, N> {
    fn target(&self) -> Option<State<T, N>> {
        match &self.target {
            Target::Held(state) => Some(state.clone()),
            Target::Owner(state) => state.upgrade(),
        }
    }
}

impl<T: Clone + PartialEq + 'static, N: UiNode> AnyListener<N> for Listener<T, N> {
    fn is_live(&self) -> bool {
        self.anchor
            .borrow()
            .as_ref()
            .is_some_and(Anchor::is_attached)
    }

    fn set_anchor(&self, anchor: Option<Anchor<N>>) {
        *self.anchor.borrow_mut() = anchor;
    }

    fn rederive(&self, runtime: &Runtime<N>) {
        let Some(target) = self.target() else {
            return;
        };
        let anchor = self.anchor.borrow().clone();
        runtime.derive_inner(Rc::clone(&self.compute), target.clone(), anchor);
        self.set_anchor(None);
        target.release_listener(std::ptr::from_ref(self).cast::<()>());
    }
}

impl<N: UiNode> Runtime<N> {
    /// Derive a new state from `compute`.
    ///
    /// The state starts at `T::default()` and is immediately set to the first
    /// result. It is recomputed whenever a state `compute` reads changes.
    pub fn derive<T, F>(&self, compute: F) -> State<T, N>
    where
        T: Clone + PartialEq + Default + 'static,
        F: Fn() -> T + 'static,
    {
        self.derive_with(compute, None, None)
    }

    /// Keep `target` equal to `compute()`.
    pub fn derive_into<T, F>(&self, compute: F, target: &State<T, N>) -> State<T, N>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        self.derive_inner(Rc::new(compute), target.clone(), None)
    }

    /// Full form: optional target (fresh if `None`) and optional explicit
    /// liveness anchor.
    pub fn derive_with<T, F>(
        &self,
        compute: F,
        target: Option<State<T, N>>,
        anchor: Option<&N>,
    ) -> State<T, N>
    where
        T: Clone + PartialEq + Default + 'static,
        F: Fn() -> T + 'static,
    {
        let target = target.unwrap_or_else(|| self.state(T::default()));
        self.derive_inner(Rc::new(compute), target, anchor.cloned().map(Anchor::Node))
    }

    pub(crate) fn derive_inner<T>(
        &self,
        compute: Rc<dyn Fn() -> T>,
        target: State<T, N>,
        anchor: Option<Anchor<N>>,
    ) -> State<T, N>
    where
        T: Clone + PartialEq + 'static,
    {
        // Inside a render the anchor is left open until the render's node
        // is known.
        let anchor = match anchor {
            Some(anchor) => Some(anchor),
            None if self.inner.new_derives.borrow().is_some() => None,
            None => Some(Anchor::Connected),
        };
        let owned = matches!(anchor, Some(Anchor::Connected));
        let pending = anchor.is_none();

        let listener: Rc<dyn AnyListener<N>> = Rc::new(Listener {
            compute: Rc::clone(&compute),
            target: if owned {
                Target::Owner(target.downgrade())
            } else {
                Target::Held(target.clone())
            },
            anchor: RefCell::new(anchor),
        });
        let link = if owned {
            target.own_listener(Rc::clone(&listener));
            ListenerRef::Weak(Rc::downgrade(&listener))
        } else {
            ListenerRef::Strong(Rc::clone(&listener))
        };
        if pending && let Some(list) = self.inner.new_derives.borrow_mut().as_mut() {
            list.push(listener);
        }

        let (value, deps) = self.run_tracked(|| compute());
        // Written outside the tracked call: an enclosing render records the
        // target as a setter, not this derivation.
        target.set(value.unwrap_or_else(|| target.get_untracked()));

        self.subscribe_all(&deps, |state| state.subscribe_listener(link.clone()));
        target
    }
}
