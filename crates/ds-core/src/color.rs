//! Color/style codec: host color representations ↔ canonical hex.
//!
//! Hosts hand colors over in several shapes: hex strings, CSS `rgb()` /
//! `rgba()` strings, channel objects named `{r,g,b}` or `{red,green,blue}`
//! in either unit or 0–255 scale, and `{color: …}` wrappers around any of
//! those. [`RawColor`] is that boundary shape; [`ColorRepr`] is the closed
//! classification with one conversion per variant. Everything past the
//! boundary sees lowercase `#rrggbb`.

use serde::{Deserialize, Serialize};

// ─── Boundary shape ──────────────────────────────────────────────────────

/// A color exactly as the host (or a fix action) provides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawColor {
    /// `#rrggbb`, `rgb(…)`, `rgba(…)` or anything else stringly.
    Text(String),
    /// `{ "color": … }` wrapper.
    Wrapped { color: Box<RawColor> },
    /// Channel object, unit or 0–255 scale.
    Channels(Channels),
}

/// Channel object. Accepts both `r/g/b` and `red/green/blue` naming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Channels {
    #[serde(alias = "red")]
    pub r: f64,
    #[serde(alias = "green")]
    pub g: f64,
    #[serde(alias = "blue")]
    pub b: f64,
    #[serde(alias = "alpha", default, skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
}

impl RawColor {
    /// Convenience constructor for a hex (or CSS) string.
    pub fn text(s: impl Into<String>) -> Self {
        RawColor::Text(s.into())
    }

    /// Canonical hex for this color, if it can be understood.
    pub fn to_hex(&self) -> Option<String> {
        to_hex(self)
    }
}

// ─── Classification ──────────────────────────────────────────────────────

/// Closed classification of a [`RawColor`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColorRepr {
    /// Well-formed hex string, passed through verbatim (trimmed).
    Hex(String),
    /// Channels in `[0, 1]`.
    RgbUnit { r: f64, g: f64, b: f64 },
    /// Channels in `[0, 255]` (from objects or CSS strings).
    Rgb255 { r: f64, g: f64, b: f64 },
    /// `{color: …}` wrapper around another representation.
    Wrapped(Box<ColorRepr>),
}

impl ColorRepr {
    /// Classify a boundary color. `None` means unparseable.
    pub fn classify(raw: &RawColor) -> Option<Self> {
        match raw {
            RawColor::Text(s) => classify_text(s),
            RawColor::Wrapped { color } => Some(ColorRepr::Wrapped(Box::new(Self::classify(color)?))),
            RawColor::Channels(Channels { r, g, b, .. }) => {
                if !(r.is_finite() && g.is_finite() && b.is_finite()) {
                    return None;
                }
                // Scale detection: all three ≤ 1 means unit scale.
                if *r <= 1.0 && *g <= 1.0 && *b <= 1.0 {
                    Some(ColorRepr::RgbUnit { r: *r, g: *g, b: *b })
                } else {
                    Some(ColorRepr::Rgb255 { r: *r, g: *g, b: *b })
                }
            }
        }
    }

    /// Convert to canonical hex.
    pub fn to_hex(&self) -> String {
        match self {
            ColorRepr::Hex(s) => s.clone(),
            ColorRepr::RgbUnit { r, g, b } => {
                hex_string(unit_byte(*r), unit_byte(*g), unit_byte(*b))
            }
            ColorRepr::Rgb255 { r, g, b } => {
                hex_string(clamp_byte(*r), clamp_byte(*g), clamp_byte(*b))
            }
            ColorRepr::Wrapped(inner) => inner.to_hex(),
        }
    }
}

fn classify_text(s: &str) -> Option<ColorRepr> {
    let s = s.trim();
    if s.starts_with('#') {
        return Color::from_hex(s).map(|_| ColorRepr::Hex(s.to_string()));
    }
    parse_css_rgb(s).map(|(r, g, b)| ColorRepr::Rgb255 { r, g, b })
}

/// Parse `rgb(r, g, b)` / `rgba(r, g, b, a)`, case-insensitive.
fn parse_css_rgb(s: &str) -> Option<(f64, f64, f64)> {
    let lower = s.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if !(parts.len() == 3 || parts.len() == 4) {
        return None;
    }
    let channel = |p: &str| p.parse::<f64>().ok().filter(|v| v.is_finite());
    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    if let Some(alpha) = parts.get(3) {
        channel(alpha)?;
    }
    Some((r.clamp(0.0, 255.0), g.clamp(0.0, 255.0), b.clamp(0.0, 255.0)))
}

// ─── Public codec ────────────────────────────────────────────────────────

/// Convert any host color representation to canonical hex.
///
/// Returns `None` for unparseable input; the caller decides whether that is
/// fatal.
pub fn to_hex(raw: &RawColor) -> Option<String> {
    ColorRepr::classify(raw).map(|repr| repr.to_hex())
}

/// Build a host color object from a hex string (inverse of [`to_hex`]).
///
/// Produces unit-scale channels, the way hosts construct colors. Alpha is
/// accepted but dropped on the way back, and [`to_hex`] always answers in
/// lowercase, so `#FFAA00` comes back as `#ffaa00`.
pub fn from_hex(hex: &str) -> Option<RawColor> {
    let c = Color::from_hex(hex.trim())?;
    Some(RawColor::Channels(Channels {
        r: f64::from(c.r),
        g: f64::from(c.g),
        b: f64::from(c.b),
        a: Some(f64::from(c.a)),
    }))
}

// ─── Parsed color ────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a hex color string: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`.
    /// The string may optionally start with `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();

        let short = |i: usize| hex_val(bytes[i]).map(|v| f32::from(v * 17) / 255.0);
        let long = |i: usize| -> Option<f32> {
            let byte = hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?;
            Some(f32::from(byte) / 255.0)
        };

        match bytes.len() {
            3 => Some(Self::rgba(short(0)?, short(1)?, short(2)?, 1.0)),
            4 => Some(Self::rgba(short(0)?, short(1)?, short(2)?, short(3)?)),
            6 => Some(Self::rgba(long(0)?, long(2)?, long(4)?, 1.0)),
            8 => Some(Self::rgba(long(0)?, long(2)?, long(4)?, long(6)?)),
            _ => None,
        }
    }
}

fn unit_byte(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn clamp_byte(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn hex_string(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
