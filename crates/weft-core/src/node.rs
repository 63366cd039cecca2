#![forbid(unsafe_code)]

//! Reference-counted in-memory UI tree.
//!
//! [`Node`] is the default host for the reactive runtime. It models the
//! small part of a document tree the runtime cares about: parent/child
//! links, element tags with ordered attributes, and text leaves.
//!
//! # Design
//!
//! Children are held strongly by their parent; the parent link is a `Weak`
//! back-reference, so detaching a subtree from the document lets it drop as
//! soon as nothing else holds a handle.
//!
//! # Invariants
//!
//! 1. A node has at most one parent, and appears exactly once in that
//!    parent's child list.
//! 2. A node is attached iff its root ancestor is a [`NodeKind::Document`].
//! 3. Appending a node to one of its own descendants is refused, so the
//!    tree never contains cycles.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::host::UiNode;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> NodeId {
    NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Process-unique node identifier, handy in traces and test output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a live tree. Everything below a document is attached.
    Document,
    /// Tagged element with attributes and children.
    Element {
        /// Tag name, e.g. `"div"`.
        tag: String,
    },
    /// Text leaf.
    Text,
}

struct NodeData {
    id: NodeId,
    kind: NodeKind,
    attrs: RefCell<Vec<(String, String)>>,
    text: RefCell<String>,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
}

/// Shared handle to a node. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Node {
    data: Rc<NodeData>,
}

impl Node {
    fn with_kind(kind: NodeKind, text: String) -> Self {
        Self {
            data: Rc::new(NodeData {
                id: next_node_id(),
                kind,
                attrs: RefCell::new(Vec::new()),
                text: RefCell::new(text),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create a new document root.
    #[must_use]
    pub fn document() -> Self {
        Self::with_kind(NodeKind::Document, String::new())
    }

    /// Create a detached element.
    #[must_use]
    pub fn element(tag: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Element { tag: tag.into() }, String::new())
    }

    /// Create a detached text node.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text, content.into())
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.data.id
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.data.kind
    }

    /// Element tag, or `None` for documents and text.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.data.kind {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        self.data.kind == NodeKind::Text
    }

    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.data
            .parent
            .borrow()
            .upgrade()
            .map(|data| Node { data })
    }

    /// Snapshot of the current children.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.data.children.borrow().clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.data.children.borrow().len()
    }

    /// Whether `other` is `self` or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &Node) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Whether the root ancestor of this node is a document.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node.data.kind == NodeKind::Document
    }

    /// Append `child` as the last child, detaching it from any previous
    /// parent first. Returns `false` (and does nothing) if `child` is `self`
    /// or one of its ancestors, or if `self` is a text node.
    pub fn append_child(&self, child: &Node) -> bool {
        if self.is_text() || child.contains(self) {
            return false;
        }
        child.detach();
        *child.data.parent.borrow_mut() = Rc::downgrade(&self.data);
        self.data.children.borrow_mut().push(child.clone());
        true
    }

    fn index_in_parent(&self, parent: &Node) -> Option<usize> {
        parent
            .data
            .children
            .borrow()
            .iter()
            .position(|c| c.ptr_eq(self))
    }

    fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        if let Some(idx) = self.index_in_parent(&parent) {
            parent.data.children.borrow_mut().remove(idx);
        }
        *self.data.parent.borrow_mut() = Weak::new();
    }

    fn splice(&self, replacement: &Node) {
        if self.ptr_eq(replacement) || replacement.contains(self) {
            return;
        }
        let Some(parent) = self.parent() else {
            return;
        };
        if self.index_in_parent(&parent).is_none() {
            return;
        }
        // A sibling replacement shifts our index when it leaves.
        replacement.detach();
        let Some(idx) = self.index_in_parent(&parent) else {
            return;
        };
        parent.data.children.borrow_mut()[idx] = replacement.clone();
        *replacement.data.parent.borrow_mut() = Rc::downgrade(&parent.data);
        *self.data.parent.borrow_mut() = Weak::new();
    }

    /// Set (or overwrite) an attribute. Attribute order is insertion order.
    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut attrs = self.data.attrs.borrow_mut();
        match attrs.iter().position(|(n, _)| *n == name) {
            Some(idx) => attrs[idx].1 = value,
            None => attrs.push((name, value)),
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        self.data
            .attrs
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn remove_attr(&self, name: &str) {
        self.data.attrs.borrow_mut().retain(|(n, _)| n != name);
    }

    /// Replace the text of a text node, or all children of an element with a
    /// single text node.
    pub fn set_text(&self, content: impl Into<String>) {
        let content = content.into();
        if self.is_text() {
            *self.data.text.borrow_mut() = content;
            return;
        }
        for child in self.children() {
            child.detach();
        }
        self.append_child(&Node::text(content));
    }

    /// Concatenated text of this node and all descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if self.is_text() {
            out.push_str(&self.data.text.borrow());
            return;
        }
        for child in self.data.children.borrow().iter() {
            child.collect_text(out);
        }
    }

    /// Serialize the subtree as HTML-like markup.
    #[must_use]
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match &self.data.kind {
            NodeKind::Text => escape_into(out, &self.data.text.borrow(), false),
            NodeKind::Document => {
                for child in self.data.children.borrow().iter() {
                    child.write_markup(out);
                }
            }
            NodeKind::Element { tag } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.data.attrs.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(out, value, true);
                    out.push('"');
                }
                out.push('>');
                for child in self.data.children.borrow().iter() {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

fn escape_into(out: &mut String, s: &str, attr: bool) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.data.id.raw())
            .field("kind", &self.data.kind)
            .field("children", &self.child_count())
            .finish()
    }
}

impl UiNode for Node {
    fn is_attached(&self) -> bool {
        self.is_connected()
    }

    fn same_node(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }

    fn replace_with(&self, replacement: &Self) {
        self.splice(replacement);
    }

    fn remove(&self) {
        self.detach();
    }

    fn text(content: &str) -> Self {
        Node::text(content)
    }
}
