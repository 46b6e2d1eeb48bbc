//! Host scene-graph model.
//!
//! The host owns a rooted tree of visual nodes, but exposes it through more
//! than one child collection: the primary `children` list, a secondary
//! "all children" set on container-like nodes (which may overlap the primary
//! list), `pages` under the root and `artboards` under each page. Each
//! collection is an edge kind ([`Link`]) in a `StableDiGraph`, so traversal
//! code can ask for exactly the collection it wants.
//!
//! The editor context (selection, insertion parent, canvas size) lives next
//! to the graph because every entry point into the document starts there.

use crate::color::RawColor;
use crate::id::NodeId;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

// ─── Node kinds & capabilities ───────────────────────────────────────────

/// The closed set of host node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Page,
    Artboard,
    Group,
    /// Media container (image plus mask shape).
    Container,
    Text,
    Rectangle,
    Ellipse,
    /// Freeform path.
    Shape,
    Image,
    Line,
}

impl NodeKind {
    /// The host's type tag.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Page => "page",
            NodeKind::Artboard => "artboard",
            NodeKind::Group => "group",
            NodeKind::Container => "container",
            NodeKind::Text => "text",
            NodeKind::Rectangle => "rectangle",
            NodeKind::Ellipse => "ellipse",
            NodeKind::Shape => "shape",
            NodeKind::Image => "image",
            NodeKind::Line => "line",
        }
    }

    /// Has a styled text run that accepts character-range edits.
    pub fn supports_text_styling(self) -> bool {
        matches!(self, NodeKind::Text)
    }

    /// Has a settable `fill`.
    pub fn supports_fill(self) -> bool {
        matches!(
            self,
            NodeKind::Rectangle | NodeKind::Ellipse | NodeKind::Shape | NodeKind::Artboard
        )
    }

    /// Has a settable `stroke`.
    pub fn supports_stroke(self) -> bool {
        matches!(
            self,
            NodeKind::Rectangle | NodeKind::Ellipse | NodeKind::Shape | NodeKind::Line
        )
    }

    pub fn supports_corner_radius(self) -> bool {
        matches!(self, NodeKind::Rectangle)
    }

    pub fn supports_shadow(self) -> bool {
        matches!(
            self,
            NodeKind::Rectangle | NodeKind::Ellipse | NodeKind::Shape | NodeKind::Image
        )
    }

    /// Has a writable `translation`.
    pub fn is_movable(self) -> bool {
        !matches!(self, NodeKind::Root | NodeKind::Page | NodeKind::Artboard)
    }

    /// Container-like kinds expose the secondary "all children" collection.
    pub fn has_all_children(self) -> bool {
        matches!(
            self,
            NodeKind::Group | NodeKind::Container | NodeKind::Artboard
        )
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Canvas dimensions of the open document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

// ─── Paint ───────────────────────────────────────────────────────────────

/// A gradient stop in host form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    #[serde(default)]
    pub offset: f64,
    pub color: RawColor,
}

/// Host fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Fill {
    #[serde(alias = "color")]
    Solid { color: RawColor },
    #[serde(alias = "gradient")]
    Linear { stops: Vec<GradientStop> },
    Radial { stops: Vec<GradientStop> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: RawColor,
    #[serde(default = "default_stroke_width")]
    pub width: f64,
}

fn default_stroke_width() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shadow {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub blur: f64,
    #[serde(default)]
    pub color: Option<RawColor>,
}

// ─── Text ────────────────────────────────────────────────────────────────

/// A resolved font, as returned by the host's font lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontHandle {
    pub postscript_name: String,
    pub family: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub weight: Option<u16>,
}

/// Character-level style. Also used as a patch: `None` fields are untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<RawColor>,
}

impl CharacterStyle {
    /// Overwrite every field that `patch` sets.
    pub fn merge(&mut self, patch: &CharacterStyle) {
        if let Some(font) = &patch.font {
            self.font = Some(font.clone());
        }
        if let Some(size) = patch.font_size {
            self.font_size = Some(size);
        }
        if let Some(weight) = patch.font_weight {
            self.font_weight = Some(weight);
        }
        if let Some(style) = &patch.font_style {
            self.font_style = Some(style.clone());
        }
        if let Some(color) = &patch.color {
            self.color = Some(color.clone());
        }
    }
}

/// A styled character range `[start, start + length)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRun {
    pub start: usize,
    pub length: usize,
    #[serde(flatten)]
    pub style: CharacterStyle,
}

impl StyleRun {
    fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
            TextAlign::Justify => "justify",
        }
    }
}

/// Text content with character style runs. Offsets count `char`s.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    #[serde(default)]
    pub runs: Vec<StyleRun>,
    #[serde(default)]
    pub align: Option<TextAlign>,
}

impl TextContent {
    pub fn new(text: impl Into<String>, style: CharacterStyle) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self {
            text,
            runs: vec![StyleRun {
                start: 0,
                length,
                style,
            }],
            align: None,
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Style of the run covering the first character (or the first run).
    pub fn leading_style(&self) -> Option<&CharacterStyle> {
        self.runs
            .iter()
            .find(|r| r.start == 0 && r.length > 0)
            .or_else(|| self.runs.first())
            .map(|r| &r.style)
    }

    /// Apply `patch` to characters `[start, start + length)`.
    ///
    /// Runs are split at the range boundaries, patched, then adjacent runs
    /// with identical style are coalesced. The range end is clamped to the
    /// text length; callers validate `start`.
    pub fn apply_character_style(&mut self, patch: &CharacterStyle, start: usize, length: usize) {
        let n = self.len();
        if n == 0 {
            match self.runs.first_mut() {
                Some(run) => run.style.merge(patch),
                None => self.runs.push(StyleRun {
                    start: 0,
                    length: 0,
                    style: patch.clone(),
                }),
            }
            return;
        }

        let start = start.min(n);
        let end = start.saturating_add(length).min(n);

        let mut cuts = vec![0, n, start, end];
        for run in &self.runs {
            cuts.push(run.start.min(n));
            cuts.push(run.end().min(n));
        }
        cuts.sort_unstable();
        cuts.dedup();

        let mut runs: Vec<StyleRun> = Vec::with_capacity(cuts.len());
        for pair in cuts.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let mut style = self
                .runs
                .iter()
                .find(|r| r.start <= a && a < r.end())
                .map(|r| r.style.clone())
                .unwrap_or_default();
            if a >= start && b <= end {
                style.merge(patch);
            }
            if let Some(prev) = runs.last_mut()
                && prev.style == style
                && prev.end() == a
            {
                prev.length += b - a;
                continue;
            }
            runs.push(StyleRun {
                start: a,
                length: b - a,
                style,
            });
        }
        self.runs = runs;
    }
}

// ─── Scene nodes ─────────────────────────────────────────────────────────

/// A single host node. Optional fields are absent when the host does not
/// expose them for this node.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: Option<NodeId>,
    pub guid: Option<NodeId>,
    pub kind: NodeKind,
    pub translation: Option<Point>,
    pub width: f64,
    pub height: f64,
    pub text: Option<TextContent>,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
    pub background_color: Option<RawColor>,
    pub corner_radius: Option<f64>,
    pub padding: Option<f64>,
    pub shadow: Option<Shadow>,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: None,
            guid: None,
            kind,
            translation: None,
            width: 0.0,
            height: 0.0,
            text: None,
            fill: None,
            stroke: None,
            background_color: None,
            corner_radius: None,
            padding: None,
            shadow: None,
        }
    }

    pub fn with_id(kind: NodeKind, id: &str) -> Self {
        Self {
            id: Some(NodeId::intern(id)),
            ..Self::new(kind)
        }
    }

    /// The authoritative identifier: `id` if present, else `guid`.
    pub fn identifier(&self) -> Option<NodeId> {
        self.id.or(self.guid)
    }
}

// ─── Scene graph ─────────────────────────────────────────────────────────

/// Which host collection an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    /// Primary ordered `children`.
    Child,
    /// Secondary "all children" set of container-like nodes.
    AllChildren,
    /// Root → page.
    Page,
    /// Page → artboard.
    Artboard,
}

/// An open document: the host's node tree plus editor context.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    /// Nodes and their collection edges.
    pub graph: StableDiGraph<SceneNode, Link>,

    /// Document root, if the host exposes one.
    pub root: Option<NodeIndex>,

    /// Document-level page list (used when there is no usable root).
    pub pages: Vec<NodeIndex>,

    /// Current selection, in selection order.
    pub selection: Vec<NodeIndex>,

    /// Current insertion (attachment) context.
    pub insertion_parent: Option<NodeIndex>,

    /// Canvas dimensions, if the host reports them.
    pub canvas: Option<Canvas>,
}

impl SceneGraph {
    /// Create an empty document with no root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document whose root is a fresh `root` node.
    #[must_use]
    pub fn with_root(id: &str) -> Self {
        let mut sg = Self::new();
        let root = sg.graph.add_node(SceneNode::with_id(NodeKind::Root, id));
        sg.root = Some(root);
        sg
    }

    /// Add a node that no collection references yet.
    pub fn add_detached(&mut self, node: SceneNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    /// Add a node into `parent`'s primary children.
    pub fn add_node(&mut self, parent: NodeIndex, node: SceneNode) -> NodeIndex {
        self.add_linked(parent, node, Link::Child)
    }

    /// Add a node into one of `parent`'s collections.
    pub fn add_linked(&mut self, parent: NodeIndex, node: SceneNode, link: Link) -> NodeIndex {
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, link);
        idx
    }

    /// Reference an existing node from another collection of `parent`.
    pub fn link(&mut self, parent: NodeIndex, child: NodeIndex, link: Link) {
        self.graph.add_edge(parent, child, link);
    }

    /// Remove a node and scrub it from the editor context.
    pub fn remove_node(&mut self, idx: NodeIndex) -> Option<SceneNode> {
        let removed = self.graph.remove_node(idx)?;
        self.selection.retain(|&i| i != idx);
        self.pages.retain(|&i| i != idx);
        if self.insertion_parent == Some(idx) {
            self.insertion_parent = None;
        }
        if self.root == Some(idx) {
            self.root = None;
        }
        Some(removed)
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&SceneNode> {
        self.graph.node_weight(idx)
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut SceneNode> {
        self.graph.node_weight_mut(idx)
    }

    /// Members of one of `idx`'s collections, in insertion order.
    pub fn linked(&self, idx: NodeIndex, link: Link) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == link)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(edge, _)| *edge);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Primary children in document order.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.linked(idx, Link::Child)
    }

    /// Linear scan for the first node carrying `id` (as `id` or `guid`).
    ///
    /// Used to wire up context from external identifiers; element lookup for
    /// fixes goes through the layered resolver instead.
    pub fn find_by_identifier(&self, id: NodeId) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].identifier() == Some(id))
    }

    /// Replace the selection with the nodes carrying `ids`. Unknown ids are
    /// ignored. Returns how many were selected.
    pub fn select(&mut self, ids: &[&str]) -> usize {
        self.selection = ids
            .iter()
            .filter_map(|s| NodeId::lookup(s))
            .filter_map(|id| self.find_by_identifier(id))
            .collect();
        self.selection.len()
    }

    /// Number of primary children directly under the root.
    pub fn top_level_count(&self) -> Option<usize> {
        self.root.map(|root| self.children(root).len())
    }

    /// Canvas dimensions, falling back to `fallback` when the host reports none.
    pub fn canvas_or(&self, fallback: Canvas) -> Canvas {
        self.canvas.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_node(id: &str, text: &str, size: f64) -> SceneNode {
        SceneNode {
            text: Some(TextContent::new(
                text,
                CharacterStyle {
                    font_size: Some(size),
                    ..Default::default()
                },
            )),
            ..SceneNode::with_id(NodeKind::Text, id)
        }
    }

    #[test]
    fn scene_graph_basics() {
        let mut sg = SceneGraph::with_root("doc");
        let root = sg.root.unwrap();
        let a = sg.add_node(root, SceneNode::with_id(NodeKind::Rectangle, "a"));
        let b = sg.add_node(root, SceneNode::with_id(NodeKind::Ellipse, "b"));

        assert_eq!(sg.children(root), vec![a, b]);
        assert_eq!(sg.top_level_count(), Some(2));
        assert_eq!(sg.find_by_identifier(NodeId::intern("b")), Some(b));
    }

    #[test]
    fn collections_are_kept_apart() {
        let mut sg = SceneGraph::with_root("doc2");
        let root = sg.root.unwrap();
        let group = sg.add_node(root, SceneNode::with_id(NodeKind::Group, "g"));
        let shown = sg.add_node(group, SceneNode::with_id(NodeKind::Rectangle, "shown"));
        let mask = sg.add_linked(
            group,
            SceneNode::with_id(NodeKind::Shape, "mask"),
            Link::AllChildren,
        );
        sg.link(group, shown, Link::AllChildren);

        assert_eq!(sg.children(group), vec![shown]);
        assert_eq!(sg.linked(group, Link::AllChildren), vec![mask, shown]);
    }

    #[test]
    fn identifier_prefers_id_over_guid() {
        let mut node = SceneNode::new(NodeKind::Image);
        node.guid = Some(NodeId::intern("guid-1"));
        assert_eq!(node.identifier(), Some(NodeId::intern("guid-1")));
        node.id = Some(NodeId::intern("id-1"));
        assert_eq!(node.identifier(), Some(NodeId::intern("id-1")));
    }

    #[test]
    fn remove_node_scrubs_context() {
        let mut sg = SceneGraph::with_root("doc3");
        let root = sg.root.unwrap();
        let a = sg.add_node(root, SceneNode::with_id(NodeKind::Rectangle, "gone"));
        sg.selection = vec![a];
        sg.insertion_parent = Some(a);
        sg.remove_node(a);
        assert!(sg.selection.is_empty());
        assert_eq!(sg.insertion_parent, None);
    }

    #[test]
    fn character_style_applies_to_whole_text() {
        let mut node = text_node("t", "Hello", 12.0);
        let text = node.text.as_mut().unwrap();
        let patch = CharacterStyle {
            font_size: Some(18.0),
            ..Default::default()
        };
        text.apply_character_style(&patch, 0, 5);
        assert_eq!(text.runs.len(), 1);
        assert_eq!(text.leading_style().unwrap().font_size, Some(18.0));
    }

    #[test]
    fn character_style_splits_runs_for_partial_range() {
        let mut content = TextContent::new(
            "Hello world",
            CharacterStyle {
                font_size: Some(12.0),
                ..Default::default()
            },
        );
        let patch = CharacterStyle {
            color: Some(RawColor::text("#ff0000")),
            ..Default::default()
        };
        content.apply_character_style(&patch, 6, 100);

        assert_eq!(content.runs.len(), 2);
        assert_eq!((content.runs[0].start, content.runs[0].length), (0, 6));
        assert_eq!((content.runs[1].start, content.runs[1].length), (6, 5));
        assert_eq!(content.runs[0].style.color, None);
        assert_eq!(content.runs[1].style.font_size, Some(12.0));
        assert!(content.runs[1].style.color.is_some());

        // Re-applying the same patch to the head coalesces back to one run.
        content.apply_character_style(&patch, 0, 6);
        assert_eq!(content.runs.len(), 1);
    }

    #[test]
    fn runs_reaching_past_usize_max_do_not_overflow() {
        let mut content = TextContent::new("Sale", CharacterStyle::default());
        content.runs.push(StyleRun {
            start: usize::MAX,
            length: 5,
            style: CharacterStyle::default(),
        });
        let patch = CharacterStyle {
            font_size: Some(30.0),
            ..Default::default()
        };
        content.apply_character_style(&patch, 0, 4);
        assert_eq!(content.runs.len(), 1);
        assert_eq!(content.runs[0].length, 4);
    }

    #[test]
    fn capabilities_follow_kind() {
        assert!(NodeKind::Text.supports_text_styling());
        assert!(!NodeKind::Image.supports_fill());
        assert!(NodeKind::Line.supports_stroke());
        assert!(!NodeKind::Ellipse.supports_corner_radius());
        assert!(!NodeKind::Page.is_movable());
        assert!(NodeKind::Artboard.has_all_children());
        assert!(!NodeKind::Root.has_all_children());
    }
}
