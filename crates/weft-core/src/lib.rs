#![forbid(unsafe_code)]

//! Core: the UI-node capability, an in-memory node tree, tree patching, and
//! time sources.

pub mod clock;
pub mod host;
pub mod node;
pub mod patch;

pub use clock::{Clock, LabClock};
pub use host::UiNode;
pub use node::{Node, NodeId, NodeKind};
pub use patch::replace_node;
