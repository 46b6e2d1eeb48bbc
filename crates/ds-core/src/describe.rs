//! Human-oriented descriptions of where an element sits on the canvas.

use crate::model::{Canvas, NodeKind, Point, SceneGraph};
use crate::record::Size;
use crate::resolve::resolve;
use serde::Serialize;

/// Coarse 3×3 grid label for a position, e.g. `top-left` or `center`.
pub fn describe_position(position: Option<Point>, canvas: Canvas) -> String {
    let Some(Point { x, y }) = position else {
        return "unknown position".to_string();
    };

    let horizontal = if x < canvas.width * 0.33 {
        "left"
    } else if x < canvas.width * 0.66 {
        "center"
    } else {
        "right"
    };
    let vertical = if y < canvas.height * 0.33 {
        "top"
    } else if y < canvas.height * 0.66 {
        "middle"
    } else {
        "bottom"
    };

    if vertical == "middle" && horizontal == "center" {
        "center".to_string()
    } else {
        format!("{vertical}-{horizontal}")
    }
}

/// Friendly type name for guidance text.
pub fn element_type_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Text => "text box",
        NodeKind::Ellipse => "circle",
        NodeKind::Container => "media container",
        other => other.as_str(),
    }
}

/// Guidance for pointing a person at an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementGuidance {
    pub found: bool,
    pub element_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    pub guidance_message: String,
}

impl ElementGuidance {
    pub fn not_found(element_id: &str) -> Self {
        Self {
            found: false,
            element_id: element_id.to_string(),
            node_type: None,
            element_type_name: None,
            human_location: None,
            position: None,
            size: None,
            guidance_message: "The element could not be found on the canvas.".to_string(),
        }
    }
}

/// Resolve `element_id` and describe it. `fallback` is the canvas size used
/// when the document reports none.
pub fn resolve_and_describe(graph: &SceneGraph, element_id: &str, fallback: Canvas) -> ElementGuidance {
    let Some(node) = resolve(graph, element_id).and_then(|idx| graph.node(idx)) else {
        return ElementGuidance::not_found(element_id);
    };

    let canvas = graph.canvas_or(fallback);
    let location = describe_position(node.translation, canvas);
    let type_name = element_type_name(node.kind);

    ElementGuidance {
        found: true,
        element_id: element_id.to_string(),
        node_type: Some(node.kind),
        element_type_name: Some(type_name),
        guidance_message: format!(
            "The issue is in the {type_name} near the {location} of your design. \
             Click that element on the canvas, then apply the fix."
        ),
        human_location: Some(location),
        position: node.translation,
        size: Some(Size {
            width: node.width,
            height: node.height,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SceneNode;
    use pretty_assertions::assert_eq;

    const CANVAS: Canvas = Canvas {
        width: 1920.0,
        height: 1080.0,
    };

    fn at(x: f64, y: f64) -> Option<Point> {
        Some(Point { x, y })
    }

    #[test]
    fn grid_labels() {
        assert_eq!(describe_position(at(0.0, 0.0), CANVAS), "top-left");
        assert_eq!(describe_position(at(960.0, 540.0), CANVAS), "center");
        assert_eq!(describe_position(at(1900.0, 540.0), CANVAS), "middle-right");
        assert_eq!(describe_position(at(960.0, 1000.0), CANVAS), "bottom-center");
        assert_eq!(describe_position(None, CANVAS), "unknown position");
    }

    #[test]
    fn document_canvas_overrides_fallback() {
        let mut sg = SceneGraph::with_root("d_root");
        let root = sg.root.unwrap();
        let mut node = SceneNode::with_id(NodeKind::Ellipse, "d_dot");
        node.translation = at(900.0, 100.0);
        node.width = 20.0;
        node.height = 20.0;
        sg.add_node(root, node);
        sg.canvas = Some(Canvas {
            width: 1000.0,
            height: 1000.0,
        });

        let guidance = resolve_and_describe(&sg, "d_dot", CANVAS);
        assert!(guidance.found);
        assert_eq!(guidance.element_type_name, Some("circle"));
        assert_eq!(guidance.human_location.as_deref(), Some("top-right"));
        assert!(guidance.guidance_message.contains("circle near the top-right"));
    }

    #[test]
    fn missing_element_is_reported_not_found() {
        let sg = SceneGraph::with_root("d_empty");
        let guidance = resolve_and_describe(&sg, "d_ghost", CANVAS);
        assert!(!guidance.found);
        assert_eq!(guidance.element_id, "d_ghost");
    }
}
