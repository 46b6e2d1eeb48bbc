//! Canonical element records.
//!
//! A record is a detached, immutable snapshot of one scene node with every
//! color already in canonical hex. Records carry no reference back to the
//! node, so they are safe to serialize, ship to the validator, and keep after
//! the document has moved on.

use crate::id::NodeId;
use crate::model::{NodeKind, Point};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// One normalized element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Point,
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_style: Option<TextStyleRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TextStyleRecord {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fill in canonical form: a solid hex color or a gradient with ordered stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FillRecord {
    Solid { color: String },
    Linear { stops: Vec<StopRecord> },
    Radial { stops: Vec<StopRecord> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    pub color: String,
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowRecord {
    pub x: f64,
    pub y: f64,
    pub blur: f64,
    pub color: String,
}

// ─── Transport ───────────────────────────────────────────────────────────

/// Encode a record set as MessagePack (field names preserved).
pub fn encode_records(records: &[ElementRecord]) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(records)
}

/// Decode a record set produced by [`encode_records`].
pub fn decode_records(bytes: &[u8]) -> Result<Vec<ElementRecord>, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
