//! Node resolver: element identifier → live node.
//!
//! Searches in layers, cheapest-likely first: the current selection, then
//! the insertion context, then the whole document from the root, then the
//! document-level pages when the host exposes no root. Each layer is a
//! depth-first walk over the same merged child enumeration the normalizer
//! uses, so anything a scan can report, the resolver can find.
//!
//! Resolved indices are only valid for the document state they were
//! resolved against. Resolve again after anything may have changed.

use crate::id::NodeId;
use crate::model::SceneGraph;
use crate::traverse::PreOrder;
use petgraph::graph::NodeIndex;

/// Where a search found its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveLayer {
    Selection,
    InsertionParent,
    Root,
    Pages,
}

const LAYERS: [ResolveLayer; 4] = [
    ResolveLayer::Selection,
    ResolveLayer::InsertionParent,
    ResolveLayer::Root,
    ResolveLayer::Pages,
];

impl ResolveLayer {
    fn starts(self, graph: &SceneGraph) -> Vec<NodeIndex> {
        match self {
            ResolveLayer::Selection => graph.selection.clone(),
            ResolveLayer::InsertionParent => graph.insertion_parent.into_iter().collect(),
            ResolveLayer::Root => graph.root.into_iter().collect(),
            // Pages hang off the root, so only walk them separately without one.
            ResolveLayer::Pages if graph.root.is_none() => graph.pages.clone(),
            ResolveLayer::Pages => Vec::new(),
        }
    }
}

/// Resolve `element_id` to a node. Fails closed: empty or unknown ids give
/// `None`, never a panic.
pub fn resolve(graph: &SceneGraph, element_id: &str) -> Option<NodeIndex> {
    resolve_with_layer(graph, element_id).map(|(_, idx)| idx)
}

/// Like [`resolve`], also reporting which layer matched.
pub fn resolve_with_layer(
    graph: &SceneGraph,
    element_id: &str,
) -> Option<(ResolveLayer, NodeIndex)> {
    if element_id.is_empty() {
        log::debug!("resolve: empty element id");
        return None;
    }
    // An identifier that was never interned cannot be on any node.
    let Some(target) = NodeId::lookup(element_id) else {
        log::warn!("resolve: `{element_id}` not found (unknown identifier)");
        return None;
    };

    for layer in LAYERS {
        let starts = layer.starts(graph);
        if starts.is_empty() {
            continue;
        }
        if let Some(idx) = search(graph, starts, target) {
            log::debug!("resolve: `{element_id}` found via {layer:?}");
            return Some((layer, idx));
        }
    }

    log::warn!("resolve: `{element_id}` not found after all layers");
    None
}

/// Depth-first search below `starts` for a node whose id/guid is `target`.
pub fn search(graph: &SceneGraph, starts: Vec<NodeIndex>, target: NodeId) -> Option<NodeIndex> {
    PreOrder::new(graph, starts)
        .find(|&idx| graph.node(idx).and_then(|n| n.identifier()) == Some(target))
}
