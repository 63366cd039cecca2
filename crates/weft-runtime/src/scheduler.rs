#![forbid(unsafe_code)]

//! The update flush.
//!
//! Mutations of observed states within one tick are batched; the first one
//! arms a flush timer. The flush then runs in three steps:
//!
//! 1. **Derive.** Listeners of changed states are re-run. States they touch
//!    form the next wave; the phase repeats until a wave is empty, capped at
//!    [`MAX_DERIVATION_CASCADE`] passes.
//! 2. **Render.** Bindings of every state that still differs from its
//!    committed value are re-rendered with their previous node, and the
//!    result is patched into the tree.
//! 3. **Commit.** `old := raw` for those states.
//!
//! Derivations fully settle before any binding renders, so a binding that
//! reads a derived state never sees an intermediate value.
//!
//! # Failure Modes
//!
//! - **Cyclic derivations**: the derive phase stops at the cap, reports
//!   [`ReactiveError::CascadeOverflow`], and the flush continues with
//!   whatever values the graph reached.
//! - **Mutation during render**: joins the next flush, not this one.

use std::cell::Cell;
use std::rc::Rc;

use ahash::AHashSet;
use weft_core::{UiNode, replace_node};

use crate::binding::Binding;
use crate::config::MAX_DERIVATION_CASCADE;
use crate::derive::AnyListener;
use crate::diagnostics::Counters;
use crate::error::ReactiveError;
use crate::runtime::Runtime;
use crate::state::Tracked;
use crate::timer::Task;
use crate::tracker::StateSet;

/// Keep the first occurrence of each `Rc`, by pointer identity.
fn distinct<T: ?Sized>(items: impl IntoIterator<Item = Rc<T>>) -> Vec<Rc<T>> {
    let mut seen = AHashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(Rc::as_ptr(item).cast::<()>() as usize))
        .collect()
}

fn dirty<N: UiNode>(
    states: impl IntoIterator<Item = Rc<dyn Tracked<N>>>,
) -> Vec<Rc<dyn Tracked<N>>> {
    states.into_iter().filter(|state| state.is_dirty()).collect()
}

/// Clears the in-flush flag on every exit path.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<N: UiNode> Runtime<N> {
    /// Add an observed state to the pending batch, arming the flush timer if
    /// the batch was empty.
    pub(crate) fn mark_changed(&self, state: Rc<dyn Tracked<N>>) {
        if let Some(derived) = self.inner.derived.borrow_mut().as_mut() {
            derived.insert(Rc::clone(&state));
        }
        let mut changed = self.inner.changed.borrow_mut();
        changed
            .get_or_insert_with(|| {
                self.schedule(Task::Flush, self.inner.config.flush_delay);
                StateSet::new()
            })
            .insert(state);
    }

    /// Whether mutations are waiting for a flush.
    #[must_use]
    pub fn has_pending_flush(&self) -> bool {
        self.inner.changed.borrow().is_some()
    }

    pub(crate) fn update_all(&self) -> Result<(), ReactiveError> {
        if self.inner.flushing.replace(true) {
            return Err(ReactiveError::ReentrantFlush);
        }
        let _guard = FlushGuard(&self.inner.flushing);

        let span = tracing::debug_span!(
            "weft.flush",
            passes = tracing::field::Empty,
            derivations = tracing::field::Empty,
            renders = tracing::field::Empty,
            committed = tracing::field::Empty,
        );
        let _enter = span.enter();

        let (passes, derivations, overflowed) = self.derive_phase();
        let (renders, committed) = self.render_phase();

        span.record("passes", passes as u64);
        span.record("derivations", derivations as u64);
        span.record("renders", renders as u64);
        span.record("committed", committed as u64);

        let counters = &self.inner.counters;
        Counters::bump(&counters.flushes, 1);
        Counters::bump(&counters.derivations, derivations as u64);
        Counters::bump(&counters.renders, renders as u64);

        if overflowed {
            tracing::error!(message = "weft.cascade_overflow", passes);
            Counters::bump(&counters.cascade_overflows, 1);
            return Err(ReactiveError::CascadeOverflow { iterations: passes });
        }
        Ok(())
    }

    /// Returns `(passes, derivations run, overflowed)`.
    fn derive_phase(&self) -> (usize, usize, bool) {
        let mut wave = dirty(
            self.inner
                .changed
                .borrow()
                .as_ref()
                .map(StateSet::to_vec)
                .unwrap_or_default(),
        );
        let mut passes = 0;
        let mut derivations = 0;
        let mut overflowed = false;
        loop {
            *self.inner.derived.borrow_mut() = Some(StateSet::new());
            let listeners: Vec<Rc<dyn AnyListener<N>>> =
                distinct(wave.iter().flat_map(|state| state.live_listeners()));
            for listener in &listeners {
                listener.rederive(self);
            }
            derivations += listeners.len();
            passes += 1;

            wave = self
                .inner
                .derived
                .borrow()
                .as_ref()
                .map(StateSet::to_vec)
                .unwrap_or_default();
            if wave.is_empty() {
                break;
            }
            if passes >= MAX_DERIVATION_CASCADE {
                overflowed = true;
                break;
            }
        }
        *self.inner.derived.borrow_mut() = None;
        (passes, derivations, overflowed)
    }

    /// Returns `(renders, committed states)`.
    fn render_phase(&self) -> (usize, usize) {
        let changed = dirty(
            self.inner
                .changed
                .borrow_mut()
                .take()
                .map(StateSet::into_vec)
                .unwrap_or_default(),
        );
        let bindings: Vec<Rc<Binding<N>>> =
            distinct(changed.iter().flat_map(|state| state.live_bindings()));
        let mut renders = 0;
        for binding in &bindings {
            if let Some(old) = binding.node() {
                let new = self.bind_inner(binding.render_fn(), Some(old.clone()));
                replace_node(&old, new.as_ref());
                renders += 1;
            }
            binding.take_node();
        }
        for state in &changed {
            state.commit();
        }
        (renders, changed.len())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use weft_core::{LabClock, Node};

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::value::UiValue;

    fn mounted() -> (Runtime, Node, Node) {
        let rt = Runtime::with_config(RuntimeConfig::lab(&LabClock::new()));
        let doc = Node::document();
        let root = Node::element("div");
        doc.append_child(&root);
        (rt, doc, root)
    }

    #[test]
    fn mutations_in_one_tick_coalesce() {
        let (rt, _doc, root) = mounted();
        let count = rt.state(0);
        let renders = Rc::new(Cell::new(0u32));
        let (c, r) = (count.clone(), Rc::clone(&renders));
        let node = rt
            .bind(
                move |_| {
                    r.set(r.get() + 1);
                    c.get()
                },
                None,
            )
            .expect("node");
        root.append_child(&node);
        assert_eq!(renders.get(), 1);

        count.set(1);
        count.set(2);
        assert_eq!(root.text_content(), "0");
        rt.tick().expect("tick");
        assert_eq!(renders.get(), 2);
        assert_eq!(root.text_content(), "2");
        assert_eq!(count.old(), 2);
    }

    #[test]
    fn set_back_to_committed_value_skips_render() {
        let (rt, _doc, root) = mounted();
        let count = rt.state(0);
        let renders = Rc::new(Cell::new(0u32));
        let (c, r) = (count.clone(), Rc::clone(&renders));
        let node = rt
            .bind(
                move |_| {
                    r.set(r.get() + 1);
                    c.get()
                },
                None,
            )
            .expect("node");
        root.append_child(&node);

        count.set(1);
        count.set(0);
        rt.settle().expect("settle");
        assert_eq!(renders.get(), 1);
        assert!(node.is_connected());
        assert_eq!(rt.diagnostics().flushes, 1);
    }

    #[test]
    fn binding_sees_fully_cascaded_value() {
        let (rt, _doc, root) = mounted();
        let a = rt.state(1);
        let a2 = a.clone();
        let b = rt.derive(move || a2.get() + 1);
        let b2 = b.clone();
        let c = rt.derive(move || b2.get() * 100);

        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (c2, log) = (c.clone(), Rc::clone(&seen));
        let node = rt
            .bind(
                move |_| {
                    let v = c2.get();
                    log.borrow_mut().push(v);
                    v
                },
                None,
            )
            .expect("node");
        root.append_child(&node);

        a.set(9);
        rt.settle().expect("settle");
        assert_eq!(*seen.borrow(), vec![200, 1000]);
        assert_eq!(root.text_content(), "1000");
    }

    #[test]
    fn detached_binding_is_not_patched() {
        let (rt, _doc, root) = mounted();
        let count = rt.state(0);
        let renders = Rc::new(Cell::new(0u32));
        let (c, r) = (count.clone(), Rc::clone(&renders));
        let node = rt
            .bind(
                move |_| {
                    r.set(r.get() + 1);
                    c.get()
                },
                None,
            )
            .expect("node");
        root.append_child(&node);
        UiNode::remove(&node);

        count.set(5);
        rt.settle().expect("settle");
        assert_eq!(renders.get(), 1);
        assert_eq!(node.text_content(), "0");
        assert_eq!(count.binding_count(), 0);
        assert_eq!(count.old(), 5);
    }

    #[test]
    fn render_to_empty_removes_node() {
        let (rt, _doc, root) = mounted();
        let visible = rt.state(true);
        let v = visible.clone();
        let node = rt
            .bind(
                move |_| {
                    if v.get() {
                        UiValue::Text("shown".into())
                    } else {
                        UiValue::Empty
                    }
                },
                None,
            )
            .expect("node");
        root.append_child(&node);

        visible.set(false);
        rt.settle().expect("settle");
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn returning_same_node_keeps_it_in_place() {
        let (rt, _doc, root) = mounted();
        let label = rt.state(String::from("a"));
        let l = label.clone();
        let el = Node::element("span");
        root.append_child(&el);
        let out = rt.hydrate(&el, move |node: Option<&Node>| {
            let node = node.cloned().unwrap_or_else(|| Node::element("span"));
            node.set_text(l.get());
            node
        });
        assert_eq!(out.as_ref(), Some(&el));

        label.set(String::from("b"));
        rt.settle().expect("settle");
        assert!(el.is_connected());
        assert_eq!(root.to_markup(), "<div><span>b</span></div>");
    }

    #[test]
    fn mutation_during_render_joins_next_flush() {
        let (rt, _doc, root) = mounted();
        let source = rt.state(0);
        let echo = rt.state(0);
        let (s, e) = (source.clone(), echo.clone());
        let writer = rt
            .bind(
                move |_| {
                    let v = s.get();
                    e.set(v);
                    v
                },
                None,
            )
            .expect("node");
        root.append_child(&writer);
        let e2 = echo.clone();
        let reader = rt.bind(move |_| e2.get(), None).expect("node");
        root.append_child(&reader);

        source.set(7);
        rt.tick().expect("tick");
        assert_eq!(echo.get(), 7);
        assert!(rt.has_pending_flush());
        assert_eq!(root.text_content(), "70");

        rt.tick().expect("tick");
        assert_eq!(root.text_content(), "77");
        assert_eq!(rt.diagnostics().flushes, 2);
    }

    #[test]
    fn cycle_terminates_at_cap() {
        let (rt, _doc, _root) = mounted();
        let a = rt.state(1);
        let b = rt.state(0);
        let a2 = a.clone();
        rt.derive_into(move || a2.get() + 1, &b);
        let b2 = b.clone();
        rt.derive_into(move || b2.get() + 1, &a);

        rt.settle().expect("settle");
        assert!(!rt.has_pending_flush());
        assert_eq!(rt.diagnostics().cascade_overflows, 1);
        assert_eq!(
            rt.drain_errors(),
            vec![ReactiveError::CascadeOverflow {
                iterations: MAX_DERIVATION_CASCADE
            }]
        );
    }

    #[test]
    fn distinct_keeps_first_by_identity() {
        let a = Rc::new(1);
        let b = Rc::new(1);
        let out = distinct(vec![Rc::clone(&a), Rc::clone(&b), Rc::clone(&a)]);
        assert_eq!(out.len(), 2);
        assert!(Rc::ptr_eq(&out[0], &a));
        assert!(Rc::ptr_eq(&out[1], &b));
    }
}
