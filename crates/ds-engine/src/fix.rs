//! Fix execution engine.
//!
//! Every action runs in two phases:
//!
//! 1. [`prepare`] is `async`. It parses the action tag, validates the value
//!    shape, converts colors and resolves fonts through the host. Nothing is
//!    written.
//! 2. [`commit`] is a plain function over `&mut SceneGraph`, called inside
//!    the host's mutation scope. It re-resolves the target, checks the node
//!    kind's capabilities and writes.
//!
//! Failures are per action: they become a [`FixResult`] and never abort a
//! batch.

use crate::action::{ActionKind, Applied, FixAction, FixResult, TextRange};
use crate::error::FixError;
use crate::host::DocumentHost;
use crate::watch::Watcher;
use ds_core::{CharacterStyle, Fill, Point, RawColor, SceneGraph, SceneNode, Shadow, Stroke, resolve};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

// ─── Prepared actions ────────────────────────────────────────────────────

/// A validated action, ready to commit without suspending.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAction {
    pub kind: ActionKind,
    pub element_id: String,
    pub mutation: Mutation,
}

/// A host color together with the canonical hex it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedColor {
    pub hex: String,
    pub color: RawColor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Character-style patch over a range (whole text when `None`).
    TextStyle {
        patch: CharacterStyle,
        range: Option<TextRange>,
        field: &'static str,
        value: Value,
    },
    SolidFill(PreparedColor),
    Stroke { color: PreparedColor, width: f64 },
    Shadow(ShadowPatch),
    Border(BorderPatch),
    Move(MoveTarget),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub blur: Option<f64>,
    pub color: Option<PreparedColor>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderPatch {
    pub radius: Option<f64>,
    pub color: Option<PreparedColor>,
    pub width: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveTarget {
    /// Missing coordinates keep their current value.
    Absolute { x: Option<f64>, y: Option<f64> },
    /// Missing deltas count as zero.
    Relative { dx: f64, dy: f64 },
}

// ─── Phase 1: prepare ────────────────────────────────────────────────────

/// Validate `action` and resolve everything that needs the host's async
/// services.
pub async fn prepare<H: DocumentHost + ?Sized>(
    host: &H,
    action: &FixAction,
) -> Result<PreparedAction, FixError> {
    let kind = ActionKind::parse(&action.action)
        .ok_or_else(|| FixError::Unknown(action.action.clone()))?;
    let tag = kind.as_str();

    let mutation = match kind {
        ActionKind::UpdateFontSize => {
            let size = parse_font_size(&action.value)?;
            Mutation::TextStyle {
                patch: CharacterStyle {
                    font_size: Some(size),
                    ..Default::default()
                },
                range: action.range,
                field: "fontSize",
                value: json!(size),
            }
        }
        ActionKind::UpdateFontFamily => {
            let name = action
                .value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| FixError::invalid(tag, "expected a font name"))?;
            let font = host
                .font_by_name(name)
                .await
                .ok_or_else(|| FixError::ResourceUnavailable(format!("font {name} unavailable")))?;
            let family = font.family.clone();
            Mutation::TextStyle {
                patch: CharacterStyle {
                    font: Some(font),
                    ..Default::default()
                },
                range: action.range,
                field: "fontFamily",
                value: Value::String(family),
            }
        }
        ActionKind::UpdateColor | ActionKind::UpdateTextColor => {
            let color = prepare_color(host, tag, &action.value)?;
            Mutation::TextStyle {
                value: Value::String(color.hex.clone()),
                patch: CharacterStyle {
                    color: Some(color.color),
                    ..Default::default()
                },
                range: action.range,
                field: "color",
            }
        }
        ActionKind::UpdateBackgroundColor | ActionKind::UpdateShapeFill => {
            Mutation::SolidFill(prepare_color(host, tag, &action.value)?)
        }
        ActionKind::UpdateShapeStroke => {
            let color = prepare_color(host, tag, &action.value)?;
            let width = action.width.unwrap_or(1.0);
            if !width.is_finite() || width < 0.0 {
                return Err(FixError::invalid(tag, "stroke width must be a non-negative number"));
            }
            Mutation::Stroke { color, width }
        }
        ActionKind::UpdateShadow => {
            let config = config_object(tag, action.config())?;
            let patch = ShadowPatch {
                x: number_field(tag, config, &["x", "offsetX"])?,
                y: number_field(tag, config, &["y", "offsetY"])?,
                blur: non_negative_field(tag, config, &["blur"])?,
                color: color_field(host, tag, config)?,
            };
            if patch == ShadowPatch::default() {
                return Err(FixError::invalid(tag, "no shadow fields given"));
            }
            Mutation::Shadow(patch)
        }
        ActionKind::UpdateBorder => {
            let config = config_object(tag, action.config())?;
            let patch = BorderPatch {
                radius: non_negative_field(tag, config, &["radius", "cornerRadius"])?,
                color: color_field(host, tag, config)?,
                width: non_negative_field(tag, config, &["width"])?,
            };
            if patch == BorderPatch::default() {
                return Err(FixError::invalid(tag, "no border fields given"));
            }
            Mutation::Border(patch)
        }
        ActionKind::MoveElement => Mutation::Move(parse_move(action.config())?),
    };
    if let Mutation::TextStyle {
        range: Some(TextRange { length: 0, .. }),
        ..
    } = &mutation
    {
        return Err(FixError::invalid(tag, "range covers no characters"));
    }

    Ok(PreparedAction {
        kind,
        element_id: action.element_id.clone(),
        mutation,
    })
}

/// A positive font size, given as a number or a numeric string.
fn parse_font_size(value: &Value) -> Result<f64, FixError> {
    let size = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    size.filter(|s| s.is_finite() && *s > 0.0)
        .ok_or_else(|| FixError::invalid("update_font_size", format!("{value} is not a positive size")))
}

fn prepare_color<H: DocumentHost + ?Sized>(
    host: &H,
    tag: &'static str,
    value: &Value,
) -> Result<PreparedColor, FixError> {
    let unreadable = || FixError::invalid(tag, format!("{value} is not a color"));
    let raw: RawColor = serde_json::from_value(value.clone()).map_err(|_| unreadable())?;
    let hex = raw.to_hex().ok_or_else(unreadable)?;
    let color = host.color_from_hex(&hex).ok_or_else(unreadable)?;
    Ok(PreparedColor { hex, color })
}

fn config_object<'a>(tag: &'static str, value: &'a Value) -> Result<&'a Map<String, Value>, FixError> {
    value
        .as_object()
        .ok_or_else(|| FixError::invalid(tag, "expected a configuration object"))
}

/// First present key among `keys`, which must hold a finite number.
fn number_field(
    tag: &'static str,
    config: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<f64>, FixError> {
    let Some((key, value)) = keys.iter().find_map(|k| config.get(*k).map(|v| (*k, v))) else {
        return Ok(None);
    };
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| FixError::invalid(tag, format!("`{key}` must be a finite number")))
}

fn non_negative_field(
    tag: &'static str,
    config: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<f64>, FixError> {
    match number_field(tag, config, keys)? {
        Some(v) if v < 0.0 => Err(FixError::invalid(
            tag,
            format!("`{}` must be a non-negative number", keys[0]),
        )),
        other => Ok(other),
    }
}

fn color_field<H: DocumentHost + ?Sized>(
    host: &H,
    tag: &'static str,
    config: &Map<String, Value>,
) -> Result<Option<PreparedColor>, FixError> {
    config
        .get("color")
        .map(|v| prepare_color(host, tag, v))
        .transpose()
}

/// `{position: {x, y}}`, `{dx, dy}` or `{x, y}`, in that order of preference.
fn parse_move(value: &Value) -> Result<MoveTarget, FixError> {
    const TAG: &str = "move_element";
    let config = config_object(TAG, value)?;

    if let Some(position) = config.get("position") {
        let position = config_object(TAG, position)?;
        return Ok(MoveTarget::Absolute {
            x: number_field(TAG, position, &["x"])?,
            y: number_field(TAG, position, &["y"])?,
        });
    }
    if config.contains_key("dx") || config.contains_key("dy") {
        return Ok(MoveTarget::Relative {
            dx: number_field(TAG, config, &["dx"])?.unwrap_or(0.0),
            dy: number_field(TAG, config, &["dy"])?.unwrap_or(0.0),
        });
    }
    if config.contains_key("x") || config.contains_key("y") {
        return Ok(MoveTarget::Absolute {
            x: number_field(TAG, config, &["x"])?,
            y: number_field(TAG, config, &["y"])?,
        });
    }
    Err(FixError::invalid(TAG, "expected {x, y}, {dx, dy} or {position: {x, y}}"))
}

// ─── Phase 2: commit ─────────────────────────────────────────────────────

/// Write a prepared action into the document. Runs inside the host's
/// mutation scope and never suspends.
pub fn commit(graph: &mut SceneGraph, prepared: &PreparedAction) -> Result<Applied, FixError> {
    let idx = resolve(graph, &prepared.element_id)
        .ok_or_else(|| FixError::NotFound(prepared.element_id.clone()))?;
    let node = graph
        .node_mut(idx)
        .ok_or_else(|| FixError::NotFound(prepared.element_id.clone()))?;
    let tag = prepared.kind.as_str();
    let unsupported = |node: &SceneNode| FixError::Unsupported {
        action: tag,
        kind: node.kind.as_str(),
    };

    match &prepared.mutation {
        Mutation::TextStyle {
            patch,
            range,
            field,
            value,
        } => {
            if !node.kind.supports_text_styling() {
                return Err(unsupported(node));
            }
            let text = node.text.get_or_insert_with(Default::default);
            let n = text.len();
            let TextRange { start, length } = range.unwrap_or(TextRange { start: 0, length: n });
            if start > n {
                return Err(FixError::invalid(
                    tag,
                    format!("range starts at {start}, past the end of a {n}-character text"),
                ));
            }
            text.apply_character_style(patch, start, length);
            Ok(Applied::default().field(field, value.clone()))
        }

        Mutation::SolidFill(color) => {
            if !node.kind.supports_fill() {
                return Err(unsupported(node));
            }
            node.fill = Some(Fill::Solid {
                color: color.color.clone(),
            });
            let applied = Applied::default().field("fill", color.hex.as_str());
            if prepared.kind == ActionKind::UpdateBackgroundColor {
                node.background_color = Some(color.color.clone());
                return Ok(applied.field("backgroundColor", color.hex.as_str()));
            }
            Ok(applied)
        }

        Mutation::Stroke { color, width } => {
            if !node.kind.supports_stroke() {
                return Err(unsupported(node));
            }
            node.stroke = Some(Stroke {
                color: color.color.clone(),
                width: *width,
            });
            Ok(Applied::default()
                .field("strokeColor", color.hex.as_str())
                .field("strokeWidth", *width))
        }

        Mutation::Shadow(patch) => {
            if !node.kind.supports_shadow() {
                return Err(unsupported(node));
            }
            let shadow = node.shadow.get_or_insert_with(Shadow::default);
            let mut applied = Applied::default();
            if let Some(x) = patch.x {
                shadow.x = x;
                applied = applied.field("x", x);
            }
            if let Some(y) = patch.y {
                shadow.y = y;
                applied = applied.field("y", y);
            }
            if let Some(blur) = patch.blur {
                shadow.blur = blur;
                applied = applied.field("blur", blur);
            }
            if let Some(color) = &patch.color {
                shadow.color = Some(color.color.clone());
                applied = applied.field("color", color.hex.as_str());
            }
            Ok(applied)
        }

        Mutation::Border(patch) => {
            let mut applied = Applied::default();

            if let Some(radius) = patch.radius {
                if node.kind.supports_corner_radius() {
                    node.corner_radius = Some(radius);
                    applied = applied.field("cornerRadius", radius);
                } else {
                    applied.unsupported.push("cornerRadius".to_string());
                }
            }

            if patch.color.is_some() || patch.width.is_some() {
                if node.kind.supports_stroke() {
                    let stroke = node.stroke.get_or_insert_with(|| Stroke {
                        color: RawColor::text("#000000"),
                        width: 1.0,
                    });
                    if let Some(color) = &patch.color {
                        stroke.color = color.color.clone();
                        applied = applied.field("strokeColor", color.hex.as_str());
                    }
                    if let Some(width) = patch.width {
                        stroke.width = width;
                        applied = applied.field("strokeWidth", width);
                    }
                } else {
                    if patch.color.is_some() {
                        applied.unsupported.push("strokeColor".to_string());
                    }
                    if patch.width.is_some() {
                        applied.unsupported.push("strokeWidth".to_string());
                    }
                }
            }

            if applied.fields.is_empty() {
                return Err(unsupported(node));
            }
            Ok(applied)
        }

        Mutation::Move(target) => {
            if !node.kind.is_movable() {
                return Err(unsupported(node));
            }
            let current = node.translation.unwrap_or_default();
            let next = match *target {
                MoveTarget::Absolute { x, y } => Point {
                    x: x.unwrap_or(current.x),
                    y: y.unwrap_or(current.y),
                },
                MoveTarget::Relative { dx, dy } => Point {
                    x: current.x + dx,
                    y: current.y + dy,
                },
            };
            if !(next.x.is_finite() && next.y.is_finite()) {
                return Err(FixError::invalid(tag, "resulting position is not finite"));
            }
            node.translation = Some(next);
            Ok(Applied::default().field("x", next.x).field("y", next.y))
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────

/// Applies fix actions to the host's document.
pub struct FixEngine<H> {
    host: Arc<H>,
    watcher: Arc<Watcher>,
    inter_action_delay: Duration,
}

impl<H: DocumentHost> FixEngine<H> {
    pub fn new(host: Arc<H>, watcher: Arc<Watcher>, inter_action_delay: Duration) -> Self {
        Self {
            host,
            watcher,
            inter_action_delay,
        }
    }

    /// Apply one action. Never fails as a whole: the outcome is in the
    /// returned result.
    pub async fn apply_fix(&self, action: FixAction) -> FixResult {
        match self.try_apply(&action).await {
            Ok(applied) => {
                log::info!(
                    "fix: {} on `{}` applied {:?}",
                    action.action,
                    action.element_id,
                    applied.fields.keys().collect::<Vec<_>>()
                );
                self.watcher.invalidate();
                FixResult::applied(action, applied)
            }
            Err(err) => {
                if err.is_skip() {
                    log::warn!("fix: {} skipped: {err}", action.action);
                } else {
                    log::info!("fix: {} on `{}` failed: {err}", action.action, action.element_id);
                }
                FixResult::failed(action, &err)
            }
        }
    }

    async fn try_apply(&self, action: &FixAction) -> Result<Applied, FixError> {
        let found = self
            .host
            .read(|g| resolve(g, &action.element_id).is_some())
            .ok_or(FixError::NoDocument)?;
        if !found {
            return Err(FixError::NotFound(action.element_id.clone()));
        }

        let prepared = prepare(self.host.as_ref(), action).await?;
        self.host
            .edit(|g| commit(g, &prepared))
            .ok_or(FixError::NoDocument)?
    }

    /// Apply `actions` one after another, in order. The result has one entry
    /// per action, at the same position.
    pub async fn apply_bulk_fixes(&self, actions: Vec<FixAction>) -> Vec<FixResult> {
        if actions.is_empty() {
            return Vec::new();
        }
        if !self.host.has_document() {
            log::warn!("fix: no document, failing {} actions", actions.len());
            return actions
                .into_iter()
                .map(|a| FixResult::failed(a, &FixError::NoDocument))
                .collect();
        }

        let mut results = Vec::with_capacity(actions.len());
        for (i, action) in actions.into_iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            results.push(self.apply_fix(action).await);
        }
        log::info!(
            "fix: batch done, {}/{} applied",
            results.iter().filter(|r| r.success).count(),
            results.len()
        );
        results
    }

    /// Let the host's own update cycle run between actions.
    async fn pause(&self) {
        if self.inter_action_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.inter_action_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use ds_core::{NodeKind, TextContent};
    use pretty_assertions::assert_eq;

    fn doc() -> SceneGraph {
        let mut sg = SceneGraph::with_root("f_root");
        let root = sg.root.unwrap();
        sg.add_node(
            root,
            SceneNode {
                text: Some(TextContent::new("Hello", CharacterStyle::default())),
                ..SceneNode::with_id(NodeKind::Text, "f_text")
            },
        );
        sg.add_node(
            root,
            SceneNode {
                translation: Some(Point { x: 10.0, y: 10.0 }),
                ..SceneNode::with_id(NodeKind::Rectangle, "f_rect")
            },
        );
        sg.add_node(root, SceneNode::with_id(NodeKind::Image, "f_img"));
        sg
    }

    async fn run(action: FixAction) -> (Result<Applied, FixError>, SceneGraph) {
        let host = MemoryHost::empty();
        let mut graph = doc();
        let result = match prepare(&host, &action).await {
            Ok(prepared) => commit(&mut graph, &prepared),
            Err(err) => Err(err),
        };
        (result, graph)
    }

    fn node<'a>(graph: &'a SceneGraph, id: &str) -> &'a SceneNode {
        let idx = resolve(graph, id).unwrap();
        graph.node(idx).unwrap()
    }

    #[tokio::test]
    async fn font_size_accepts_numeric_strings() {
        let (result, graph) = run(FixAction::new("update_font_size", "f_text", json!("18"))).await;
        assert_eq!(result.unwrap().fields.get("fontSize"), Some(&json!(18.0)));
        let text = node(&graph, "f_text").text.as_ref().unwrap();
        assert_eq!(text.leading_style().unwrap().font_size, Some(18.0));
    }

    #[tokio::test]
    async fn font_size_rejects_non_positive_values() {
        for bad in [json!(0), json!(-3), json!("big"), Value::Null] {
            let (result, _) = run(FixAction::new("update_font_size", "f_text", bad)).await;
            assert!(matches!(result, Err(FixError::InvalidInput { .. })));
        }
    }

    #[tokio::test]
    async fn text_range_past_the_end_is_invalid() {
        let mut action = FixAction::new("update_text_color", "f_text", json!("#ff0000"));
        action.range = Some(TextRange { start: 9, length: 1 });
        let (result, _) = run(action).await;
        assert!(matches!(result, Err(FixError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn empty_text_range_is_invalid() {
        let mut action = FixAction::new("update_font_size", "f_text", json!(30));
        action.range = Some(TextRange { start: 0, length: 0 });
        let (result, graph) = run(action).await;
        assert!(matches!(result, Err(FixError::InvalidInput { .. })));
        let text = node(&graph, "f_text").text.as_ref().unwrap();
        assert_eq!(text.leading_style().unwrap().font_size, None);
    }

    #[tokio::test]
    async fn background_color_sets_fill_and_background() {
        let (result, graph) =
            run(FixAction::new("update_background_color", "f_rect", json!("#00ff00"))).await;
        let applied = result.unwrap();
        assert_eq!(applied.fields.get("fill"), Some(&json!("#00ff00")));
        assert_eq!(applied.fields.get("backgroundColor"), Some(&json!("#00ff00")));
        let rect = node(&graph, "f_rect");
        assert_eq!(
            rect.background_color.as_ref().and_then(|c| c.to_hex()).as_deref(),
            Some("#00ff00")
        );
    }

    #[tokio::test]
    async fn negative_border_and_shadow_sizes_are_invalid() {
        for payload in [
            json!({ "width": -3 }),
            json!({ "radius": -10 }),
            json!({ "cornerRadius": -1, "color": "#000000" }),
        ] {
            let mut action = FixAction::new("update_border", "f_rect", Value::Null);
            action.payload = Some(payload);
            let (result, graph) = run(action).await;
            assert!(matches!(result, Err(FixError::InvalidInput { .. })));
            assert_eq!(node(&graph, "f_rect").stroke, None);
        }

        let mut action = FixAction::new("update_shadow", "f_rect", Value::Null);
        action.payload = Some(json!({ "blur": -4 }));
        let (result, _) = run(action).await;
        assert!(matches!(result, Err(FixError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn text_color_on_a_shape_is_unsupported() {
        let (result, _) = run(FixAction::new("update_color", "f_rect", json!("#ff0000"))).await;
        assert_eq!(
            result.unwrap_err(),
            FixError::Unsupported {
                action: "update_color",
                kind: "rectangle"
            }
        );
    }

    #[tokio::test]
    async fn fill_converts_through_the_codec() {
        let (result, graph) =
            run(FixAction::new("update_shape_fill", "f_rect", json!("rgb(255, 0, 0)"))).await;
        assert_eq!(result.unwrap().fields.get("fill"), Some(&json!("#ff0000")));
        let Some(Fill::Solid { color }) = &node(&graph, "f_rect").fill else {
            panic!("expected a solid fill");
        };
        assert_eq!(color.to_hex().as_deref(), Some("#ff0000"));
    }

    #[tokio::test]
    async fn fill_on_an_image_is_unsupported() {
        let (result, _) =
            run(FixAction::new("update_background_color", "f_img", json!("#ffffff"))).await;
        assert!(matches!(result, Err(FixError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn stroke_defaults_to_width_one() {
        let (result, graph) =
            run(FixAction::new("update_shape_stroke", "f_rect", json!("#112233"))).await;
        assert_eq!(result.unwrap().fields.get("strokeWidth"), Some(&json!(1.0)));
        assert_eq!(node(&graph, "f_rect").stroke.as_ref().unwrap().width, 1.0);
    }

    #[tokio::test]
    async fn shadow_merges_onto_existing() {
        let mut action = FixAction::new("update_shadow", "f_rect", Value::Null);
        action.payload = Some(json!({ "blur": 8, "color": "#000000" }));
        let (result, graph) = run(action).await;
        let applied = result.unwrap();
        assert_eq!(applied.fields.len(), 2);
        let shadow = node(&graph, "f_rect").shadow.as_ref().unwrap();
        assert_eq!((shadow.x, shadow.blur), (0.0, 8.0));
    }

    #[tokio::test]
    async fn relative_and_absolute_moves() {
        let (result, graph) =
            run(FixAction::new("move_element", "f_rect", json!({ "dx": 5, "dy": -5 }))).await;
        assert!(result.is_ok());
        assert_eq!(
            node(&graph, "f_rect").translation,
            Some(Point { x: 15.0, y: 5.0 })
        );

        let (_, graph) = run(FixAction::new(
            "move_element",
            "f_rect",
            json!({ "position": { "x": 100, "y": 200 } }),
        ))
        .await;
        assert_eq!(
            node(&graph, "f_rect").translation,
            Some(Point { x: 100.0, y: 200.0 })
        );
    }

    #[tokio::test]
    async fn unknown_action_is_reported() {
        let (result, _) = run(FixAction::new("make_it_pop", "f_rect", Value::Null)).await;
        assert_eq!(result.unwrap_err().to_string(), "unknown action: make_it_pop");
    }
}
