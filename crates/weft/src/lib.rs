#![forbid(unsafe_code)]

//! weft: reactive state cells bound to a live UI tree.
//!
//! ```
//! use weft::dom::{ChildValue, Prop, element};
//! use weft::{LabClock, Node, Runtime, RuntimeConfig};
//!
//! let rt = Runtime::with_config(RuntimeConfig::lab(&LabClock::new()));
//! let doc = Node::document();
//!
//! let count = rt.state(0);
//! let c = count.clone();
//! let label = rt.derive(move || format!("clicked {} times", c.get()));
//!
//! let view = element(
//!     &rt,
//!     "p",
//!     [("class", Prop::from("counter"))],
//!     [ChildValue::state(&label)],
//! );
//! doc.append_child(&view);
//!
//! count.set(3);
//! rt.settle().unwrap();
//! assert_eq!(view.to_markup(), r#"<p class="counter">clicked 3 times</p>"#);
//! ```

pub mod dom;

pub use weft_core::{Clock, LabClock, Node, NodeId, NodeKind, UiNode, replace_node};
pub use weft_runtime::{
    DEFAULT_GC_INTERVAL, Diagnostics, MAX_DERIVATION_CASCADE, ReactiveError, Result, Runtime,
    RuntimeConfig, State, StateId, UiValue,
};
