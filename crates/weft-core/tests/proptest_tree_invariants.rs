//! Property-based invariants for the in-memory tree.
//!
//! 1. Every node appears exactly once in its parent's child list.
//! 2. A node is attached iff walking up its parents reaches the document.
//! 3. Arbitrary appends and replacements never create a cycle.

use proptest::prelude::*;
use weft_core::{Node, UiNode, replace_node};

#[derive(Debug, Clone)]
enum Op {
    Append { parent: usize, child: usize },
    Replace { old: usize, new: usize },
    Remove(usize),
}

fn arb_op(nodes: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..nodes, 0..nodes).prop_map(|(parent, child)| Op::Append { parent, child }),
        (0..nodes, 0..nodes).prop_map(|(old, new)| Op::Replace { old, new }),
        (0..nodes).prop_map(Op::Remove),
    ]
}

const NODES: usize = 8;

fn pool() -> (Node, Vec<Node>) {
    let doc = Node::document();
    let mut nodes = vec![doc.clone()];
    for i in 1..NODES {
        nodes.push(Node::element(format!("n{i}")));
    }
    (doc, nodes)
}

fn root_of(node: &Node) -> Node {
    let mut cursor = node.clone();
    while let Some(parent) = cursor.parent() {
        cursor = parent;
    }
    cursor
}

proptest! {
    #[test]
    fn tree_stays_well_formed(ops in proptest::collection::vec(arb_op(NODES), 0..60)) {
        let (doc, nodes) = pool();
        for op in ops {
            match op {
                Op::Append { parent, child } => {
                    let _ = nodes[parent].append_child(&nodes[child]);
                }
                Op::Replace { old, new } if old != 0 && new != 0 => {
                    replace_node(&nodes[old], Some(&nodes[new]));
                }
                Op::Remove(idx) if idx != 0 => nodes[idx].remove(),
                _ => {}
            }
        }

        for node in &nodes {
            if let Some(parent) = node.parent() {
                let hits = parent.children().iter().filter(|c| c.ptr_eq(node)).count();
                prop_assert_eq!(hits, 1);
                prop_assert!(!node.contains(&parent));
            }
            prop_assert_eq!(node.is_attached(), root_of(node).ptr_eq(&doc));
        }
    }
}
