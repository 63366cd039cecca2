#![forbid(unsafe_code)]

//! What a render function hands back.

use weft_core::{Node, UiNode};

/// Output of a render function before it is coerced to a node.
///
/// Plain values become text nodes; [`UiValue::Empty`] means "no node", which
/// removes the previously rendered node when the binding is patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiValue<N> {
    Node(N),
    Text(String),
    Empty,
}

impl<N: UiNode> UiValue<N> {
    /// Coerce to a concrete node, wrapping text in a fresh text node.
    #[must_use]
    pub fn into_node(self) -> Option<N> {
        match self {
            Self::Node(node) => Some(node),
            Self::Text(text) => Some(N::text(&text)),
            Self::Empty => None,
        }
    }
}

impl From<Node> for UiValue<Node> {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Option<Node>> for UiValue<Node> {
    fn from(node: Option<Node>) -> Self {
        node.map_or(Self::Empty, Self::Node)
    }
}

impl<N> From<String> for UiValue<N> {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl<N> From<&str> for UiValue<N> {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl<N> From<()> for UiValue<N> {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

macro_rules! text_from_display {
    ($($t:ty),* $(,)?) => {
        $(
            impl<N> From<$t> for UiValue<N> {
                fn from(value: $t) -> Self {
                    Self::Text(value.to_string())
                }
            }
        )*
    };
}

text_from_display!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
);
