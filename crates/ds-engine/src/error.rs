//! Error taxonomy for fix execution.
//!
//! A `FixError` is always scoped to one action. It is rendered into that
//! action's [`crate::action::FixResult`] and never crosses the batch boundary.

/// Why a single fix action did not apply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FixError {
    /// The target could not be located. Non-fatal: it may have been deleted
    /// between scan and fix, so callers should re-scan.
    #[error("{0} not found")]
    NotFound(String),

    /// The node kind lacks the property the action needs.
    #[error("{action} is not supported for {kind} nodes")]
    Unsupported {
        action: &'static str,
        kind: &'static str,
    },

    /// Malformed action value.
    #[error("invalid value for {action}: {reason}")]
    InvalidInput {
        action: &'static str,
        reason: String,
    },

    /// A resource the action needs (font, collaborator) is unavailable.
    #[error("{0}")]
    ResourceUnavailable(String),

    /// Unrecognized action tag.
    #[error("unknown action: {0}")]
    Unknown(String),

    /// No open document to act on.
    #[error("document is not available; re-open the document and try again")]
    NoDocument,
}

impl FixError {
    pub(crate) fn invalid(action: &'static str, reason: impl Into<String>) -> Self {
        FixError::InvalidInput {
            action,
            reason: reason.into(),
        }
    }

    /// `true` when the action should be reported as skipped rather than failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, FixError::NotFound(_))
    }
}

/// Why a fix-planning response yielded no actions.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("fix planning returned no actions")]
    NoActions,

    #[error("fix planning returned malformed actions: {0}")]
    Malformed(#[from] serde_json::Error),
}
