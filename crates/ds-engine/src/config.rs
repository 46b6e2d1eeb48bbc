//! Engine configuration.

use ds_core::{Canvas, DEFAULT_SCAN_ORDER, ScanSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`crate::session::Session`].
///
/// Every field has a default, so a JSON config only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Change-watcher poll period in milliseconds. Default: **1000**.
    pub poll_interval_ms: u64,

    /// Pause between actions of a bulk fix, in milliseconds. `0` still
    /// yields once to the scheduler. Default: **10**.
    pub inter_action_delay_ms: u64,

    /// Canvas size assumed when the document reports none.
    /// Default: **1920×1080**.
    pub default_canvas: Canvas,

    /// Scan entry points, tried in order until one yields records.
    pub scan_order: Vec<ScanSource>,

    /// Buffered document-changed pushes per subscriber before the slowest
    /// one starts lagging. Default: **16**.
    pub notify_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            inter_action_delay_ms: 10,
            default_canvas: Canvas::default(),
            scan_order: DEFAULT_SCAN_ORDER.to_vec(),
            notify_capacity: 16,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn inter_action_delay(&self) -> Duration {
        Duration::from_millis(self.inter_action_delay_ms)
    }
}
