#![forbid(unsafe_code)]

//! Reactive runtime for weft.
//!
//! - [`State`]: a value cell that remembers both its current value and the
//!   value as of the last completed update cycle.
//! - [`Runtime::derive`]: a state kept equal to a computation over other
//!   states.
//! - [`Runtime::bind`]: a render function whose output node is replaced in
//!   the tree whenever a state it read changes.
//!
//! # Architecture
//!
//! Dependencies are discovered, not declared. Reads inside a tracked call
//! land in the runtime's current dependency set; when the call returns, a
//! subscriber is attached to each state it read.
//!
//! Writes are batched. The first mutation of an observed state arms a flush
//! timer; the flush re-runs derivations until they settle, then re-renders
//! affected bindings and commits. The host drives timers with
//! [`Runtime::tick`].
//!
//! Subscribers are never removed by hand. A periodic sweep drops those whose
//! node has left the document.
//!
//! # Invariants
//!
//! 1. A state read several times in one tracked call is recorded once.
//! 2. Setting an equal value is a no-op.
//! 3. An unobserved state commits on `set`; an observed one commits at the
//!    end of the next flush.
//! 4. Any number of mutations before a flush cause at most one re-render per
//!    binding.
//! 5. Bindings only ever observe fully cascaded derived values.
//! 6. A derivation cycle stops after [`MAX_DERIVATION_CASCADE`] passes.

mod binding;
mod collector;
pub mod config;
mod derive;
pub mod diagnostics;
pub mod error;
mod runtime;
mod scheduler;
mod state;
mod timer;
mod tracker;
pub mod value;

pub use config::{DEFAULT_GC_INTERVAL, MAX_DERIVATION_CASCADE, RuntimeConfig};
pub use diagnostics::Diagnostics;
pub use error::{ReactiveError, Result};
pub use runtime::Runtime;
pub use state::{State, StateId};
pub use value::UiValue;
pub use weft_core::{Clock, LabClock, Node, UiNode};
