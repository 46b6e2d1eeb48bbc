//! JSON document snapshots → [`SceneGraph`].
//!
//! A snapshot is how a host (or a test fixture) hands a whole document over
//! in one piece:
//!
//! ```json
//! {
//!   "root": { "id": "doc", "type": "root", "pages": [ … ] },
//!   "selection": ["title"],
//!   "insertionParent": "board",
//!   "canvas": { "width": 1080, "height": 1080 }
//! }
//! ```
//!
//! Node objects may carry `children`, `allChildren`, `pages` and
//! `artboards`. An `allChildren` entry is either a full node or a string
//! naming one of the node's primary children, which is how overlap between
//! the two collections is expressed.

use crate::color::RawColor;
use crate::id::NodeId;
use crate::model::{
    Canvas, CharacterStyle, Fill, Link, NodeKind, Point, SceneGraph, SceneNode, Shadow, Stroke,
    StyleRun, TextContent,
};
use petgraph::graph::NodeIndex;
use serde::Deserialize;

/// Why a snapshot could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`allChildren` of `{parent}` references `{reference}`, which is not one of its children")]
    UnknownChildRef { parent: String, reference: String },

    #[error("{context} references unknown element `{id}`")]
    UnknownElement { context: &'static str, id: String },
}

// ─── Wire shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSpec {
    #[serde(default)]
    root: Option<NodeSpec>,
    #[serde(default)]
    pages: Vec<NodeSpec>,
    #[serde(default)]
    selection: Vec<String>,
    #[serde(default)]
    insertion_parent: Option<String>,
    #[serde(default)]
    canvas: Option<Canvas>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeSpec {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    guid: Option<String>,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    translation: Option<Point>,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    text: Option<TextSpec>,
    /// Shorthand: one style for the whole text.
    #[serde(default)]
    text_style: Option<CharacterStyle>,
    #[serde(default)]
    fill: Option<Fill>,
    #[serde(default)]
    stroke: Option<Stroke>,
    #[serde(default)]
    background_color: Option<RawColor>,
    #[serde(default)]
    corner_radius: Option<f64>,
    #[serde(default)]
    padding: Option<f64>,
    #[serde(default)]
    shadow: Option<Shadow>,
    #[serde(default)]
    children: Vec<NodeSpec>,
    #[serde(default)]
    all_children: Vec<ChildRef>,
    #[serde(default)]
    pages: Vec<NodeSpec>,
    #[serde(default)]
    artboards: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextSpec {
    Plain(String),
    Styled(TextContent),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChildRef {
    Ref(String),
    Node(NodeSpec),
}

// ─── Loading ─────────────────────────────────────────────────────────────

/// Parse a JSON snapshot into a scene graph.
pub fn parse_snapshot(json: &str) -> Result<SceneGraph, SnapshotError> {
    let spec: DocumentSpec = serde_json::from_str(json)?;
    let mut graph = SceneGraph::new();

    if let Some(root) = spec.root {
        graph.root = Some(add_spec(&mut graph, None, root)?);
    }
    for page in spec.pages {
        let idx = add_spec(&mut graph, None, page)?;
        graph.pages.push(idx);
    }

    for id in &spec.selection {
        let idx = find(&graph, id).ok_or_else(|| SnapshotError::UnknownElement {
            context: "selection",
            id: id.clone(),
        })?;
        graph.selection.push(idx);
    }
    if let Some(id) = &spec.insertion_parent {
        graph.insertion_parent =
            Some(find(&graph, id).ok_or_else(|| SnapshotError::UnknownElement {
                context: "insertionParent",
                id: id.clone(),
            })?);
    }
    graph.canvas = spec.canvas;

    log::debug!(
        "snapshot: loaded {} nodes ({} selected)",
        graph.graph.node_count(),
        graph.selection.len()
    );
    Ok(graph)
}

fn find(graph: &SceneGraph, id: &str) -> Option<NodeIndex> {
    NodeId::lookup(id).and_then(|id| graph.find_by_identifier(id))
}

fn add_spec(
    graph: &mut SceneGraph,
    parent: Option<(NodeIndex, Link)>,
    spec: NodeSpec,
) -> Result<NodeIndex, SnapshotError> {
    let NodeSpec {
        id,
        guid,
        kind,
        translation,
        width,
        height,
        text,
        text_style,
        fill,
        stroke,
        background_color,
        corner_radius,
        padding,
        shadow,
        children,
        all_children,
        pages,
        artboards,
    } = spec;

    let node = SceneNode {
        id: id.as_deref().map(NodeId::intern),
        guid: guid.as_deref().map(NodeId::intern),
        kind,
        translation,
        width,
        height,
        text: text.map(|t| build_text(t, text_style)),
        fill,
        stroke,
        background_color,
        corner_radius,
        padding,
        shadow,
    };
    let label = node
        .identifier()
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| kind.as_str().to_string());

    let idx = match parent {
        Some((p, link)) => graph.add_linked(p, node, link),
        None => graph.add_detached(node),
    };

    for page in pages {
        add_spec(graph, Some((idx, Link::Page)), page)?;
    }
    for artboard in artboards {
        add_spec(graph, Some((idx, Link::Artboard)), artboard)?;
    }
    for child in children {
        add_spec(graph, Some((idx, Link::Child)), child)?;
    }
    for extra in all_children {
        match extra {
            ChildRef::Node(spec) => {
                add_spec(graph, Some((idx, Link::AllChildren)), spec)?;
            }
            ChildRef::Ref(reference) => {
                let target = NodeId::lookup(&reference).and_then(|rid| {
                    graph
                        .children(idx)
                        .into_iter()
                        .find(|&c| graph.node(c).and_then(|n| n.identifier()) == Some(rid))
                });
                let Some(target) = target else {
                    return Err(SnapshotError::UnknownChildRef {
                        parent: label,
                        reference,
                    });
                };
                graph.link(idx, target, Link::AllChildren);
            }
        }
    }

    Ok(idx)
}

fn build_text(spec: TextSpec, style: Option<CharacterStyle>) -> TextContent {
    let mut content = match spec {
        TextSpec::Plain(text) => TextContent::new(text, CharacterStyle::default()),
        TextSpec::Styled(content) => content,
    };
    let len = content.len();
    content.runs.retain_mut(|run| {
        run.start = run.start.min(len);
        run.length = run.length.min(len - run.start);
        run.length > 0 || len == 0
    });
    if content.runs.is_empty() {
        content.runs.push(StyleRun {
            start: 0,
            length: content.len(),
            style: CharacterStyle::default(),
        });
    }
    if let Some(style) = style {
        content.apply_character_style(&style, 0, len);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r##"{
        "root": {
            "id": "s_root", "type": "root",
            "pages": [{
                "id": "s_page", "type": "page",
                "artboards": [{
                    "id": "s_board", "type": "artboard",
                    "children": [
                        { "id": "s_title", "type": "text", "text": "Hi",
                          "textStyle": { "fontSize": 24 } },
                        { "guid": "s_group", "type": "group",
                          "children": [{ "id": "s_box", "type": "rectangle",
                                         "fill": { "type": "color", "color": "#FFFFFF" } }],
                          "allChildren": ["s_box", { "id": "s_mask", "type": "shape" }] }
                    ]
                }]
            }]
        },
        "selection": ["s_title"],
        "insertionParent": "s_board"
    }"##;

    #[test]
    fn loads_collections_and_context() {
        let sg = parse_snapshot(DOC).unwrap();
        let group = sg.find_by_identifier(NodeId::intern("s_group")).unwrap();
        assert_eq!(sg.children(group).len(), 1);
        assert_eq!(sg.linked(group, Link::AllChildren).len(), 2);
        assert_eq!(sg.selection.len(), 1);
        assert_eq!(
            sg.insertion_parent,
            sg.find_by_identifier(NodeId::intern("s_board"))
        );
    }

    #[test]
    fn text_style_shorthand_covers_whole_text() {
        let sg = parse_snapshot(DOC).unwrap();
        let title = sg.find_by_identifier(NodeId::intern("s_title")).unwrap();
        let text = sg.node(title).unwrap().text.as_ref().unwrap();
        assert_eq!(text.runs.len(), 1);
        assert_eq!(text.runs[0].length, 2);
        assert_eq!(text.leading_style().unwrap().font_size, Some(24.0));
    }

    #[test]
    fn oversized_style_runs_are_clamped() {
        let json = r#"{ "root": { "id": "s_root2", "type": "root", "children": [
            { "id": "s_runs", "type": "text", "textStyle": { "fontSize": 14 },
              "text": { "text": "Sale", "runs": [
                { "start": 0, "length": 2, "fontSize": 30 },
                { "start": 18446744073709551615, "length": 5, "fontSize": 99 }
              ] } }
        ] } }"#;
        let sg = parse_snapshot(json).unwrap();
        let idx = sg.find_by_identifier(NodeId::intern("s_runs")).unwrap();
        let text = sg.node(idx).unwrap().text.as_ref().unwrap();
        assert_eq!(text.len(), 4);
        assert!(text.runs.iter().all(|r| r.start + r.length <= 4));
        assert!(text.runs.iter().all(|r| r.style.font_size == Some(14.0)));
    }

    #[test]
    fn dangling_child_reference_is_an_error() {
        let json = r#"{ "root": { "id": "s_bad", "type": "group", "allChildren": ["s_nope"] } }"#;
        assert!(matches!(
            parse_snapshot(json),
            Err(SnapshotError::UnknownChildRef { .. })
        ));
    }

    #[test]
    fn unknown_selection_is_an_error() {
        let json = r#"{ "root": { "id": "s_sel", "type": "root" }, "selection": ["s_missing_sel"] }"#;
        assert!(matches!(
            parse_snapshot(json),
            Err(SnapshotError::UnknownElement { context: "selection", .. })
        ));
    }

    #[test]
    fn unknown_node_type_is_rejected() {
        let json = r#"{ "root": { "id": "s_t", "type": "hologram" } }"#;
        assert!(matches!(parse_snapshot(json), Err(SnapshotError::Json(_))));
    }
}
