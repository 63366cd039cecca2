#![forbid(unsafe_code)]

//! The capability a UI node must expose to take part in reactive updates.
//!
//! The runtime never inspects node contents. It only needs to know whether a
//! node is still part of the live tree, whether two handles name the same
//! node, how to splice one node in place of another, and how to wrap plain
//! text. Any tree that can answer those questions can host bindings.

/// A handle to a node in some live UI tree.
///
/// Handles are cheap to clone and compare by identity via
/// [`same_node`](UiNode::same_node), not by structure.
///
/// # Invariants
///
/// 1. `a.same_node(&a)` is always true.
/// 2. After `old.replace_with(&new)` on an attached `old`, `new` is attached
///    and `old` is not.
/// 3. After `node.remove()`, `node.is_attached()` is false.
pub trait UiNode: Clone + 'static {
    /// Whether the node is currently reachable from the live document root.
    fn is_attached(&self) -> bool;

    /// Identity comparison.
    fn same_node(&self, other: &Self) -> bool;

    /// Put `replacement` where `self` currently sits and detach `self`.
    ///
    /// A no-op when `self` has no parent.
    fn replace_with(&self, replacement: &Self);

    /// Detach the node from its parent, if any.
    fn remove(&self);

    /// Create a detached text node holding `content`.
    fn text(content: &str) -> Self;
}
