#![forbid(unsafe_code)]

//! Bindings: render functions attached to the live tree.
//!
//! [`Runtime::bind`] runs a render function once under dependency tracking,
//! turns the result into a node, and subscribes a fresh [`Binding`] to every
//! state the function read. When any of those states change, the scheduler
//! re-runs the function with the node it last produced and swaps the new node
//! in.
//!
//! # Invariants
//!
//! 1. Every `bind` call creates exactly one binding. Re-rendering creates a
//!    new one; the superseded binding loses its node and is pruned.
//! 2. Derivations created while a render function runs are anchored to the
//!    node that render produces.
//! 3. A binding that writes a state it also reads does not subscribe to it.
//!
//! # Failure Modes
//!
//! - Render function panics: the panic is reported, the input node is kept
//!   as the result, and nothing is patched.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use weft_core::{UiNode, replace_node};

use crate::derive::{Anchor, AnyListener};
use crate::runtime::Runtime;
use crate::state::Tracked;
use crate::tracker::DepSet;
use crate::value::UiValue;

pub(crate) type RenderFn<N> = Rc<dyn Fn(Option<&N>) -> UiValue<N>>;

/// A render function plus the node it last produced.
pub(crate) struct Binding<N: UiNode> {
    render: RenderFn<N>,
    node: RefCell<Option<N>>,
}

impl<N: UiNode> Binding<N> {
    /// Live while its node is attached to the document.
    pub(crate) fn is_live(&self) -> bool {
        self.node.borrow().as_ref().is_some_and(UiNode::is_attached)
    }

    pub(crate) fn render_fn(&self) -> RenderFn<N> {
        Rc::clone(&self.render)
    }

    pub(crate) fn take_node(&self) -> Option<N> {
        self.node.borrow_mut().take()
    }

    pub(crate) fn node(&self) -> Option<N> {
        self.node.borrow().clone()
    }
}

impl<N: UiNode + fmt::Debug> fmt::Debug for Binding<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("node", &*self.node.borrow())
            .finish_non_exhaustive()
    }
}

impl<N: UiNode> Runtime<N> {
    /// Render `render` once and keep it bound to the states it reads.
    ///
    /// `node` is passed through to the render function; the scheduler passes
    /// the previously rendered node on re-renders. Returns the node produced,
    /// or `None` if the render function returned [`UiValue::Empty`].
    pub fn bind<F, V>(&self, render: F, node: Option<&N>) -> Option<N>
    where
        F: Fn(Option<&N>) -> V + 'static,
        V: Into<UiValue<N>>,
    {
        let render: RenderFn<N> =
            Rc::new(move |node: Option<&N>| -> UiValue<N> { render(node).into() });
        self.bind_inner(render, node.cloned())
    }

    /// Attach reactivity to an existing node: bind `render` against `node`
    /// and patch the result in its place.
    pub fn hydrate<F, V>(&self, node: &N, render: F) -> Option<N>
    where
        F: Fn(Option<&N>) -> V + 'static,
        V: Into<UiValue<N>>,
    {
        let rendered = self.bind(render, Some(node));
        replace_node(node, rendered.as_ref());
        rendered
    }

    pub(crate) fn bind_inner(&self, render: RenderFn<N>, node: Option<N>) -> Option<N> {
        let binding = Rc::new(Binding {
            render: Rc::clone(&render),
            node: RefCell::new(None),
        });
        let outer_pending = self.inner.new_derives.replace(Some(Vec::new()));

        let (value, deps) = self.run_tracked(|| render(node.as_ref()));
        let rendered = match value {
            Some(value) => value.into_node(),
            None => node,
        };

        self.subscribe_all(&deps, |state| state.subscribe_binding(Rc::clone(&binding)));

        let pending: Vec<Rc<dyn AnyListener<N>>> = self
            .inner
            .new_derives
            .replace(outer_pending)
            .unwrap_or_default();
        for listener in pending {
            listener.set_anchor(rendered.clone().map(Anchor::Node));
        }

        *binding.node.borrow_mut() = rendered.clone();
        rendered
    }

    /// Subscribe to every getter that is not also a setter, marking each for
    /// liveness collection.
    pub(crate) fn subscribe_all(
        &self,
        deps: &DepSet<N>,
        subscribe: impl Fn(&dyn Tracked<N>),
    ) {
        for state in deps.subscriptions() {
            self.schedule_collect(state);
            subscribe(state.as_ref());
        }
    }
}
