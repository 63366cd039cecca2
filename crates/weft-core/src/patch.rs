#![forbid(unsafe_code)]

//! Whole-subtree replacement.
//!
//! There is no reconciliation: a re-rendered binding hands back a fresh node
//! and the old one is swapped out wholesale.

use crate::host::UiNode;

/// Replace `old` with `new` in the live tree.
///
/// - `new == None`: `old` is removed.
/// - `new` is the same node as `old`: nothing happens.
/// - otherwise `new` is spliced in where `old` was and `old` is detached.
///
/// Patching a node that has already left the tree is a no-op.
pub fn replace_node<N: UiNode>(old: &N, new: Option<&N>) {
    match new {
        Some(new) if new.same_node(old) => {}
        Some(new) => old.replace_with(new),
        None => old.remove(),
    }
}
