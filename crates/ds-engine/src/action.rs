//! Fix actions and their outcomes, as they travel on the wire.
//!
//! The `action` tag stays a plain string here so that an unrecognized tag is
//! reported as a per-action failure instead of rejecting the whole batch at
//! deserialization time. Typed interpretation happens in [`crate::fix`].

use crate::error::{FixError, PlanError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ─── Action kinds ────────────────────────────────────────────────────────

/// The recognized action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    UpdateFontSize,
    UpdateFontFamily,
    UpdateColor,
    UpdateTextColor,
    UpdateBackgroundColor,
    UpdateShapeFill,
    UpdateShapeStroke,
    UpdateShadow,
    UpdateBorder,
    MoveElement,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::UpdateFontSize,
        ActionKind::UpdateFontFamily,
        ActionKind::UpdateColor,
        ActionKind::UpdateTextColor,
        ActionKind::UpdateBackgroundColor,
        ActionKind::UpdateShapeFill,
        ActionKind::UpdateShapeStroke,
        ActionKind::UpdateShadow,
        ActionKind::UpdateBorder,
        ActionKind::MoveElement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::UpdateFontSize => "update_font_size",
            ActionKind::UpdateFontFamily => "update_font_family",
            ActionKind::UpdateColor => "update_color",
            ActionKind::UpdateTextColor => "update_text_color",
            ActionKind::UpdateBackgroundColor => "update_background_color",
            ActionKind::UpdateShapeFill => "update_shape_fill",
            ActionKind::UpdateShapeStroke => "update_shape_stroke",
            ActionKind::UpdateShadow => "update_shadow",
            ActionKind::UpdateBorder => "update_border",
            ActionKind::MoveElement => "move_element",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Fix action ──────────────────────────────────────────────────────────

/// A character range `[start, start + length)` for text-scoped edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub length: usize,
}

/// One corrective action, as supplied by the fix planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixAction {
    /// Action tag, e.g. `update_font_size`.
    pub action: String,

    /// Target element identifier.
    #[serde(default, alias = "elementid", alias = "elementId")]
    pub element_id: String,

    /// Action-specific value; its required shape depends on `action`.
    #[serde(default)]
    pub value: Value,

    /// Character range for text-scoped actions. Default: the whole text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TextRange>,

    /// Stroke width for stroke actions. Default: 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    /// Configuration object for composite actions (shadow, border).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl FixAction {
    pub fn new(action: impl Into<String>, element_id: impl Into<String>, value: Value) -> Self {
        Self {
            action: action.into(),
            element_id: element_id.into(),
            value,
            range: None,
            width: None,
            payload: None,
        }
    }

    /// The configuration for composite actions: `payload`, else `value`.
    pub fn config(&self) -> &Value {
        self.payload.as_ref().unwrap_or(&self.value)
    }
}

// ─── Results ─────────────────────────────────────────────────────────────

/// What a successful commit changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Applied {
    /// Fields actually written, with their new values.
    pub fields: Map<String, Value>,
    /// Sub-fields of a composite action the node kind could not take.
    pub unsupported: Vec<String>,
}

impl Applied {
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,
    pub action: FixAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The target vanished (as opposed to the mutation being rejected).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported: Vec<String>,
}

impl FixResult {
    pub fn applied(action: FixAction, applied: Applied) -> Self {
        Self {
            success: true,
            action,
            applied: Some(applied.fields),
            error: None,
            skipped: false,
            unsupported: applied.unsupported,
        }
    }

    pub fn failed(action: FixAction, error: &FixError) -> Self {
        Self {
            success: false,
            action,
            applied: None,
            error: Some(error.to_string()),
            skipped: error.is_skip(),
            unsupported: Vec::new(),
        }
    }
}

/// Fixed / failed / skipped counts over a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixReport {
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub results: Vec<FixResult>,
}

impl FixReport {
    pub fn from_results(results: Vec<FixResult>) -> Self {
        let fixed = results.iter().filter(|r| r.success).count();
        let skipped = results.iter().filter(|r| !r.success && r.skipped).count();
        Self {
            fixed,
            skipped,
            failed: results.len() - fixed - skipped,
            total: results.len(),
            results,
        }
    }
}

// ─── Fix-plan responses ──────────────────────────────────────────────────

/// Pull the action list out of a fix-planning response.
///
/// Accepts `{fixes: {actions}}`, `{fix_plan: {actions}}` and `{actions}`, in
/// that order of preference.
pub fn extract_planned_actions(response: &Value) -> Result<Vec<FixAction>, PlanError> {
    let actions = response
        .pointer("/fixes/actions")
        .or_else(|| response.pointer("/fix_plan/actions"))
        .or_else(|| response.get("actions"))
        .filter(|v| v.is_array())
        .ok_or(PlanError::NoActions)?;

    let actions: Vec<FixAction> = serde_json::from_value(actions.clone())?;
    if actions.is_empty() {
        return Err(PlanError::NoActions);
    }
    Ok(actions)
}
