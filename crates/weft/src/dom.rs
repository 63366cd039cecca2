#![forbid(unsafe_code)]

//! Element construction helpers.
//!
//! Children and attribute values arrive as tagged unions and are resolved
//! once, here:
//!
//! | Child                      | Result                                 |
//! |----------------------------|----------------------------------------|
//! | [`ChildValue::Literal`]    | appended as a text node                |
//! | [`ChildValue::Node`]       | appended as is                         |
//! | [`ChildValue::StateRef`]   | bound; re-renders when the state moves |
//! | [`ChildValue::Render`]     | bound render function                  |
//! | [`ChildValue::Sequence`]   | flattened in order                     |
//!
//! A reactive [`Prop`] is kept up to date by a derivation anchored to the
//! element it decorates, so it is collected with that element.

use std::fmt;
use std::rc::Rc;

use weft_core::Node;
use weft_runtime::{Runtime, State, UiValue};

type Reader = Rc<dyn Fn() -> UiValue<Node>>;
type Render = Rc<dyn Fn(Option<&Node>) -> UiValue<Node>>;

/// A child passed to [`add`] or [`element`].
#[derive(Clone)]
pub enum ChildValue {
    Literal(String),
    Node(Node),
    /// Reads a state; rendered as its current value.
    StateRef(Reader),
    /// A render function; receives its previously rendered node.
    Render(Render),
    Sequence(Vec<ChildValue>),
}

impl ChildValue {
    /// Child that shows the current value of `state`.
    pub fn state<T>(state: &State<T>) -> Self
    where
        T: Clone + PartialEq + Into<UiValue<Node>> + 'static,
    {
        let state = state.clone();
        Self::StateRef(Rc::new(move || -> UiValue<Node> { state.get().into() }))
    }

    /// Child produced by a render function.
    pub fn render<F, V>(render: F) -> Self
    where
        F: Fn(Option<&Node>) -> V + 'static,
        V: Into<UiValue<Node>>,
    {
        Self::Render(Rc::new(move |node: Option<&Node>| -> UiValue<Node> {
            render(node).into()
        }))
    }
}

impl fmt::Debug for ChildValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::StateRef(_) => f.write_str("StateRef(..)"),
            Self::Render(_) => f.write_str("Render(..)"),
            Self::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
        }
    }
}

impl From<&str> for ChildValue {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_owned())
    }
}

impl From<String> for ChildValue {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

impl From<Node> for ChildValue {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<&Node> for ChildValue {
    fn from(node: &Node) -> Self {
        Self::Node(node.clone())
    }
}

impl<T> From<&State<T>> for ChildValue
where
    T: Clone + PartialEq + Into<UiValue<Node>> + 'static,
{
    fn from(state: &State<T>) -> Self {
        Self::state(state)
    }
}

impl<C: Into<ChildValue>> From<Vec<C>> for ChildValue {
    fn from(items: Vec<C>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

/// An attribute value.
#[derive(Clone)]
pub enum Prop {
    Static(String),
    /// Recomputed whenever a state it reads changes.
    Reactive(Rc<dyn Fn() -> String>),
}

impl Prop {
    pub fn reactive<F, S>(compute: F) -> Self
    where
        F: Fn() -> S + 'static,
        S: Into<String>,
    {
        Self::Reactive(Rc::new(move || -> String { compute().into() }))
    }

    /// Attribute that mirrors `state`.
    pub fn state<T>(state: &State<T>) -> Self
    where
        T: Clone + PartialEq + ToString + 'static,
    {
        let state = state.clone();
        Self::Reactive(Rc::new(move || state.get().to_string()))
    }
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Reactive(_) => f.write_str("Reactive(..)"),
        }
    }
}

impl From<&str> for Prop {
    fn from(value: &str) -> Self {
        Self::Static(value.to_owned())
    }
}

impl From<String> for Prop {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

/// Append `children` to `parent`, binding the reactive ones.
///
/// Returns `parent` for chaining.
pub fn add<I>(rt: &Runtime, parent: &Node, children: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<ChildValue>,
{
    for child in children {
        add_one(rt, parent, child.into());
    }
    parent.clone()
}

fn add_one(rt: &Runtime, parent: &Node, child: ChildValue) {
    let node = match child {
        ChildValue::Literal(text) => Some(Node::text(text)),
        ChildValue::Node(node) => Some(node),
        ChildValue::StateRef(read) => rt.bind(move |_| read(), None),
        ChildValue::Render(render) => rt.bind(move |node: Option<&Node>| render(node), None),
        ChildValue::Sequence(items) => {
            for item in items {
                add_one(rt, parent, item);
            }
            None
        }
    };
    if let Some(node) = node
        && !parent.append_child(&node)
    {
        tracing::warn!(
            message = "weft.dom.append_refused",
            parent = parent.id().raw(),
            child = node.id().raw()
        );
    }
}

/// Create a `tag` element with `props` and `children`.
pub fn element<P, K, C>(rt: &Runtime, tag: &str, props: P, children: C) -> Node
where
    P: IntoIterator<Item = (K, Prop)>,
    K: Into<String>,
    C: IntoIterator,
    C::Item: Into<ChildValue>,
{
    let el = Node::element(tag);
    for (name, prop) in props {
        let name = name.into();
        match prop {
            Prop::Static(value) => el.set_attr(name, value),
            Prop::Reactive(compute) => {
                let target = el.clone();
                rt.derive_with(
                    move || {
                        let value = compute();
                        target.set_attr(name.clone(), value.clone());
                        value
                    },
                    None,
                    Some(&el),
                );
            }
        }
    }
    tracing::trace!(message = "weft.dom.element", tag, id = el.id().raw());
    add(rt, &el, children)
}

#[cfg(test)]
mod tests {
    use weft_runtime::{LabClock, RuntimeConfig};

    use super::*;

    fn lab_runtime() -> Runtime {
        Runtime::with_config(RuntimeConfig::lab(&LabClock::new()))
    }

    const NO_PROPS: [(&str, Prop); 0] = [];

    #[test]
    fn literals_and_nodes_are_appended_in_order() {
        let rt = lab_runtime();
        let parent = Node::element("p");
        let out = add(
            &rt,
            &parent,
            vec![
                ChildValue::from("a"),
                ChildValue::from(Node::element("br")),
                ChildValue::from(vec!["b", "c"]),
            ],
        );
        assert!(out.ptr_eq(&parent));
        assert_eq!(parent.to_markup(), "<p>a<br></br>bc</p>");
    }

    #[test]
    fn state_child_follows_state() {
        let rt = lab_runtime();
        let doc = Node::document();
        let count = rt.state(1);
        let el = element(&rt, "span", NO_PROPS, [ChildValue::state(&count)]);
        doc.append_child(&el);
        assert_eq!(el.to_markup(), "<span>1</span>");

        count.set(2);
        rt.settle().expect("settle");
        assert_eq!(el.to_markup(), "<span>2</span>");
    }

    #[test]
    fn render_child_can_vanish() {
        let rt = lab_runtime();
        let doc = Node::document();
        let show = rt.state(true);
        let s = show.clone();
        let el = element(
            &rt,
            "div",
            NO_PROPS,
            [ChildValue::render(move |_| {
                if s.get() { Some(Node::element("i")) } else { None }
            })],
        );
        doc.append_child(&el);
        assert_eq!(el.child_count(), 1);

        show.set(false);
        rt.settle().expect("settle");
        assert_eq!(el.child_count(), 0);
    }

    #[test]
    fn static_and_reactive_props() {
        let rt = lab_runtime();
        let doc = Node::document();
        let theme = rt.state(String::from("light"));
        let t = theme.clone();
        let el = element(
            &rt,
            "button",
            [
                ("type", Prop::from("button")),
                ("class", Prop::reactive(move || format!("btn-{}", t.get()))),
            ],
            ["Go"],
        );
        doc.append_child(&el);
        assert_eq!(
            el.to_markup(),
            r#"<button type="button" class="btn-light">Go</button>"#
        );

        theme.set(String::from("dark"));
        rt.settle().expect("settle");
        assert_eq!(el.attr("class").as_deref(), Some("btn-dark"));
    }

    #[test]
    fn reactive_prop_stops_with_its_element() {
        let lab = LabClock::new();
        let rt = Runtime::with_config(RuntimeConfig::lab(&lab));
        let doc = Node::document();
        let size = rt.state(1);
        let el = element(&rt, "div", [("data-size", Prop::state(&size))], NO_CHILDREN);
        doc.append_child(&el);
        assert_eq!(el.attr("data-size").as_deref(), Some("1"));

        weft_core::UiNode::remove(&el);
        size.set(2);
        rt.settle().expect("settle");
        assert_eq!(el.attr("data-size").as_deref(), Some("1"));
        assert_eq!(size.listener_count(), 0);
    }

    const NO_CHILDREN: [ChildValue; 0] = [];

    #[test]
    fn appending_to_text_is_refused() {
        let rt = lab_runtime();
        let text = Node::text("leaf");
        add(&rt, &text, ["x"]);
        assert_eq!(text.child_count(), 0);
    }

    #[test]
    fn debug_hides_closures() {
        let rt = lab_runtime();
        let s = rt.state(0);
        let child = ChildValue::from(vec![ChildValue::from("x"), ChildValue::from(&s)]);
        let dbg = format!("{child:?}");
        assert!(dbg.contains("Literal(\"x\")"));
        assert!(dbg.contains("StateRef(..)"));
        assert_eq!(format!("{:?}", Prop::reactive(|| "v")), "Reactive(..)");
    }
}
