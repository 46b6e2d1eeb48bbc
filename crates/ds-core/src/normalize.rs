//! Scene-graph normalizer: live nodes → canonical [`ElementRecord`]s.
//!
//! Walks depth-first in pre-order using the merged child enumeration from
//! [`crate::traverse`], emitting one record per reachable node. Extraction
//! is per node and never aborts the walk: a node that cannot be described is
//! logged and omitted while its children are still visited. The document
//! root itself is walked through but never emitted.

use crate::color::to_hex;
use crate::id::NodeId;
use crate::model::{Fill, GradientStop, NodeKind, Point, SceneGraph, SceneNode};
use crate::record::{
    ElementRecord, FillRecord, ShadowRecord, Size, StopRecord, TextStyleRecord,
};
use crate::traverse::PreOrder;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Fallback for color fields the codec cannot read.
const FALLBACK_COLOR: &str = "#000000";

// ─── Entry points ────────────────────────────────────────────────────────

/// A candidate starting point for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    /// Every selected node, expanded recursively.
    Selection,
    /// The current insertion context, expanded recursively.
    InsertionParent,
    /// Full traversal from the document root.
    Root,
    /// Full traversal over the document-level pages.
    Pages,
}

/// Selection first, then insertion context, then root, then pages.
pub const DEFAULT_SCAN_ORDER: [ScanSource; 4] = [
    ScanSource::Selection,
    ScanSource::InsertionParent,
    ScanSource::Root,
    ScanSource::Pages,
];

impl ScanSource {
    /// Start nodes this source offers in `graph` (possibly none).
    pub fn starts(self, graph: &SceneGraph) -> Vec<NodeIndex> {
        match self {
            ScanSource::Selection => graph.selection.clone(),
            ScanSource::InsertionParent => graph.insertion_parent.into_iter().collect(),
            ScanSource::Root => graph.root.into_iter().collect(),
            ScanSource::Pages => graph.pages.clone(),
        }
    }
}

/// Try each source in `order`; the first one yielding records wins.
///
/// Sources are evaluated lazily, so later ones cost nothing when an earlier
/// one succeeds.
pub fn scan_with_source(
    graph: &SceneGraph,
    order: &[ScanSource],
) -> Option<(ScanSource, Vec<ElementRecord>)> {
    order.iter().find_map(|&source| {
        let starts = source.starts(graph);
        if starts.is_empty() {
            log::debug!("scan: {source:?} offers no start nodes");
            return None;
        }
        let records = normalize_from(graph, starts);
        if records.is_empty() {
            log::debug!("scan: {source:?} produced no records");
            None
        } else {
            log::debug!("scan: {source:?} produced {} records", records.len());
            Some((source, records))
        }
    })
}

/// Scan with the given entry-point order. Empty when no source yields.
pub fn scan(graph: &SceneGraph, order: &[ScanSource]) -> Vec<ElementRecord> {
    scan_with_source(graph, order)
        .map(|(_, records)| records)
        .unwrap_or_default()
}

// ─── Traversal ───────────────────────────────────────────────────────────

/// Normalize the subtree under `root`.
pub fn normalize(graph: &SceneGraph, root: NodeIndex) -> Vec<ElementRecord> {
    normalize_from(graph, [root])
}

/// Normalize several subtrees in one pass; a node shared between them is
/// emitted once.
pub fn normalize_from(
    graph: &SceneGraph,
    starts: impl IntoIterator<Item = NodeIndex>,
) -> Vec<ElementRecord> {
    let mut records = Vec::new();
    for idx in PreOrder::new(graph, starts) {
        let Some(node) = graph.node(idx) else {
            continue;
        };
        // The document root is the container, not an element.
        if node.kind == NodeKind::Root {
            continue;
        }
        match extract(node, records.len()) {
            Ok(record) => records.push(record),
            Err(err) => log::warn!("normalize: skipping {} node: {err}", node.kind.as_str()),
        }
    }
    records
}

// ─── Extraction ──────────────────────────────────────────────────────────

/// Why a single node could not be turned into a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
}

fn finite(value: f64, field: &'static str) -> Result<f64, ExtractError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExtractError::NonFinite { field })
    }
}

/// Describe one node. `index` feeds the synthetic id of unidentified nodes.
pub fn extract(node: &SceneNode, index: usize) -> Result<ElementRecord, ExtractError> {
    let translation = node.translation.unwrap_or_default();
    let position = Point {
        x: finite(translation.x, "position.x")?,
        y: finite(translation.y, "position.y")?,
    };
    let size = Size {
        width: finite(node.width, "width")?,
        height: finite(node.height, "height")?,
    };

    Ok(ElementRecord {
        id: node.identifier().unwrap_or_else(|| NodeId::synthetic(index)),
        kind: node.kind,
        position,
        size,
        text: node.text.as_ref().map(|t| t.text.clone()),
        text_style: extract_text_style(node),
        fill: node.fill.as_ref().map(extract_fill),
        background_color: node.background_color.as_ref().and_then(to_hex),
        border_radius: node.corner_radius,
        padding: node.padding,
        shadow: node.shadow.as_ref().map(|s| ShadowRecord {
            x: s.x,
            y: s.y,
            blur: s.blur,
            color: s
                .color
                .as_ref()
                .and_then(to_hex)
                .unwrap_or_else(|| FALLBACK_COLOR.into()),
        }),
    })
}

fn extract_text_style(node: &SceneNode) -> Option<TextStyleRecord> {
    let content = node.text.as_ref()?;
    let mut record = TextStyleRecord {
        text_align: content.align.map(|a| a.as_str().to_string()),
        ..Default::default()
    };

    if let Some(style) = content.leading_style() {
        let font = style.font.as_ref();
        record.font_family = font.map(|f| f.family.clone());
        record.font_size = style.font_size;
        record.font_weight = style.font_weight.or_else(|| font.and_then(|f| f.weight));
        record.font_style = style
            .font_style
            .clone()
            .or_else(|| font.and_then(|f| f.style.clone()));
        record.color = style.color.as_ref().and_then(to_hex);
    }

    (!record.is_empty()).then_some(record)
}

fn extract_fill(fill: &Fill) -> FillRecord {
    let stops = |stops: &[GradientStop]| -> Vec<StopRecord> {
        stops
            .iter()
            .map(|s| StopRecord {
                color: to_hex(&s.color).unwrap_or_else(|| FALLBACK_COLOR.into()),
                offset: s.offset,
            })
            .collect()
    };
    match fill {
        Fill::Solid { color } => FillRecord::Solid {
            color: to_hex(color).unwrap_or_else(|| FALLBACK_COLOR.into()),
        },
        Fill::Linear { stops: s } => FillRecord::Linear { stops: stops(s) },
        Fill::Radial { stops: s } => FillRecord::Radial { stops: stops(s) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RawColor;
    use crate::model::{CharacterStyle, FontHandle, Link, TextAlign, TextContent};
    use pretty_assertions::assert_eq;

    fn ids(records: &[ElementRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    fn doc() -> SceneGraph {
        let mut sg = SceneGraph::with_root("n_root");
        let root = sg.root.unwrap();
        let page = sg.add_linked(root, SceneNode::with_id(NodeKind::Page, "n_page"), Link::Page);
        let board = sg.add_linked(
            page,
            SceneNode::with_id(NodeKind::Artboard, "n_board"),
            Link::Artboard,
        );
        let group = sg.add_node(board, SceneNode::with_id(NodeKind::Group, "n_group"));
        let shared = sg.add_node(group, SceneNode::with_id(NodeKind::Rectangle, "n_rect"));
        sg.link(group, shared, Link::AllChildren);
        sg.add_linked(
            group,
            SceneNode::with_id(NodeKind::Shape, "n_mask"),
            Link::AllChildren,
        );
        sg.add_node(board, SceneNode::new(NodeKind::Ellipse));
        sg
    }

    #[test]
    fn normalize_emits_each_node_once_in_preorder() {
        let sg = doc();
        let records = normalize(&sg, sg.root.unwrap());
        assert_eq!(
            ids(&records),
            vec![
                "n_page", "n_board", "n_group", "n_rect", "n_mask", "element_5"
            ]
        );
    }

    #[test]
    fn scan_prefers_selection_then_falls_back() {
        let mut sg = doc();
        assert_eq!(
            scan_with_source(&sg, &DEFAULT_SCAN_ORDER).map(|(s, r)| (s, r.len())),
            Some((ScanSource::Root, 6))
        );

        sg.select(&["n_group"]);
        let (source, records) = scan_with_source(&sg, &DEFAULT_SCAN_ORDER).unwrap();
        assert_eq!(source, ScanSource::Selection);
        assert_eq!(ids(&records), vec!["n_group", "n_rect", "n_mask"]);
    }

    #[test]
    fn overlapping_selection_is_deduplicated() {
        let mut sg = doc();
        sg.select(&["n_group", "n_rect"]);
        let records = scan(&sg, &DEFAULT_SCAN_ORDER);
        assert_eq!(ids(&records), vec!["n_group", "n_rect", "n_mask"]);
    }

    #[test]
    fn pages_are_the_last_resort() {
        let mut sg = SceneGraph::new();
        let page = sg.add_detached(SceneNode::with_id(NodeKind::Page, "orphan_page"));
        sg.add_linked(
            page,
            SceneNode::with_id(NodeKind::Artboard, "orphan_board"),
            Link::Artboard,
        );
        sg.pages.push(page);
        assert_eq!(
            ids(&scan(&sg, &DEFAULT_SCAN_ORDER)),
            vec!["orphan_page", "orphan_board"]
        );
        assert!(scan(&SceneGraph::new(), &DEFAULT_SCAN_ORDER).is_empty());
    }

    #[test]
    fn broken_node_is_omitted_but_children_survive() {
        let mut sg = SceneGraph::with_root("bad_root");
        let root = sg.root.unwrap();
        let mut broken = SceneNode::with_id(NodeKind::Group, "broken");
        broken.width = f64::NAN;
        let broken = sg.add_node(root, broken);
        sg.add_node(broken, SceneNode::with_id(NodeKind::Text, "survivor"));

        let records = normalize(&sg, root);
        assert_eq!(ids(&records), vec!["survivor"]);
    }

    #[test]
    fn extraction_maps_styles_to_canonical_form() {
        let mut node = SceneNode::with_id(NodeKind::Text, "headline");
        node.translation = Some(Point { x: 40.0, y: 60.0 });
        node.width = 300.0;
        node.height = 48.0;
        let mut content = TextContent::new(
            "Launch",
            CharacterStyle {
                font: Some(FontHandle {
                    postscript_name: "Inter-Bold".into(),
                    family: "Inter".into(),
                    style: Some("normal".into()),
                    weight: Some(700),
                }),
                font_size: Some(32.0),
                color: Some(RawColor::text("rgb(255, 0, 0)")),
                ..Default::default()
            },
        );
        content.align = Some(TextAlign::Center);
        node.text = Some(content);

        let record = extract(&node, 0).unwrap();
        assert_eq!(record.text.as_deref(), Some("Launch"));
        assert_eq!(
            record.text_style,
            Some(TextStyleRecord {
                font_family: Some("Inter".into()),
                font_size: Some(32.0),
                font_weight: Some(700),
                font_style: Some("normal".into()),
                text_align: Some("center".into()),
                color: Some("#ff0000".into()),
            })
        );
        assert_eq!(record.position, Point { x: 40.0, y: 60.0 });
    }

    #[test]
    fn unreadable_colors_fall_back_to_black() {
        let mut node = SceneNode::with_id(NodeKind::Rectangle, "odd");
        node.fill = Some(Fill::Solid {
            color: RawColor::text("chartreuse"),
        });
        node.background_color = Some(RawColor::text("nope"));
        let record = extract(&node, 0).unwrap();
        assert_eq!(
            record.fill,
            Some(FillRecord::Solid {
                color: "#000000".into()
            })
        );
        assert_eq!(record.background_color, None);
    }
}
