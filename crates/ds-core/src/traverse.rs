//! Traversal primitives shared by the normalizer and the resolver.
//!
//! The host has no single child-enumeration mechanism, so "the children of a
//! node" is computed here once: page and artboard collections first, then
//! the primary children, then whatever the secondary "all children" set adds
//! that the primary list does not already hold.

use crate::model::{Link, NodeKind, SceneGraph};
use petgraph::graph::NodeIndex;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Child list of a single node, in visiting order.
pub type Expansion = SmallVec<[NodeIndex; 8]>;

/// Merged child enumeration for `idx`.
///
/// A missing node, or a node lacking any of the collections, simply
/// contributes nothing for that collection.
pub fn expand(graph: &SceneGraph, idx: NodeIndex) -> Expansion {
    let mut out = Expansion::new();
    let Some(node) = graph.node(idx) else {
        return out;
    };

    match node.kind {
        NodeKind::Root => out.extend(graph.linked(idx, Link::Page)),
        NodeKind::Page => out.extend(graph.linked(idx, Link::Artboard)),
        _ => {}
    }

    let primary = graph.children(idx);
    out.extend(primary.iter().copied());

    if node.kind.has_all_children() {
        let primary_ids: HashSet<_> = primary
            .iter()
            .filter_map(|&c| graph.node(c).and_then(|n| n.identifier()))
            .collect();
        for extra in graph.linked(idx, Link::AllChildren) {
            if primary.contains(&extra) {
                continue;
            }
            let duplicate = graph
                .node(extra)
                .and_then(|n| n.identifier())
                .is_some_and(|id| primary_ids.contains(&id));
            if !duplicate {
                out.push(extra);
            }
        }
    }

    out
}

/// Depth-first pre-order walk over one or more start nodes.
///
/// Each node is yielded at most once per walk even when it is reachable
/// through several collections or start points. Uses an explicit stack, so
/// deep documents do not grow the call stack.
pub struct PreOrder<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeIndex>,
    visited: HashSet<NodeIndex>,
}

impl<'a> PreOrder<'a> {
    pub fn new(graph: &'a SceneGraph, starts: impl IntoIterator<Item = NodeIndex>) -> Self {
        let mut stack: Vec<NodeIndex> = starts.into_iter().collect();
        stack.reverse();
        Self {
            graph,
            stack,
            visited: HashSet::new(),
        }
    }
}

impl Iterator for PreOrder<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        while let Some(idx) = self.stack.pop() {
            if self.graph.node(idx).is_none() || !self.visited.insert(idx) {
                continue;
            }
            let children = expand(self.graph, idx);
            self.stack.extend(children.into_iter().rev());
            return Some(idx);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SceneNode;
    use pretty_assertions::assert_eq;

    #[test]
    fn expansion_orders_pages_before_children() {
        let mut sg = SceneGraph::with_root("root_x");
        let root = sg.root.unwrap();
        let page = sg.add_linked(root, SceneNode::with_id(NodeKind::Page, "p1"), Link::Page);
        let stray = sg.add_node(root, SceneNode::with_id(NodeKind::Text, "stray"));
        assert_eq!(expand(&sg, root).to_vec(), vec![page, stray]);
    }

    #[test]
    fn secondary_children_skip_primary_ids() {
        let mut sg = SceneGraph::with_root("root_y");
        let root = sg.root.unwrap();
        let group = sg.add_node(root, SceneNode::with_id(NodeKind::Group, "grp"));
        let a = sg.add_node(group, SceneNode::with_id(NodeKind::Rectangle, "a"));
        sg.link(group, a, Link::AllChildren);
        // A distinct host object carrying the same identifier as a primary child.
        sg.add_linked(
            group,
            SceneNode::with_id(NodeKind::Rectangle, "a"),
            Link::AllChildren,
        );
        let extra = sg.add_linked(
            group,
            SceneNode::with_id(NodeKind::Shape, "mask"),
            Link::AllChildren,
        );
        assert_eq!(expand(&sg, group).to_vec(), vec![a, extra]);
    }

    #[test]
    fn secondary_children_ignored_on_plain_nodes() {
        let mut sg = SceneGraph::with_root("root_z");
        let root = sg.root.unwrap();
        sg.add_linked(
            root,
            SceneNode::with_id(NodeKind::Rectangle, "hidden"),
            Link::AllChildren,
        );
        assert!(expand(&sg, root).is_empty());
    }

    #[test]
    fn preorder_visits_each_node_once() {
        let mut sg = SceneGraph::with_root("root_w");
        let root = sg.root.unwrap();
        let g = sg.add_node(root, SceneNode::with_id(NodeKind::Group, "g"));
        let c = sg.add_node(g, SceneNode::with_id(NodeKind::Ellipse, "c"));
        let d = sg.add_node(root, SceneNode::with_id(NodeKind::Line, "d"));

        let order: Vec<_> = PreOrder::new(&sg, [root, g]).collect();
        assert_eq!(order, vec![root, g, c, d]);
    }
}
