//! Events module for status transitions
//!
//! Structured events published by the status manager whenever the mode
//! changes or the profile text is (or fails to be) updated.

use serde::{Deserialize, Serialize};

use crate::state::StatusMode;

/// Events emitted by the status manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Mode switched between live and suspended
    ModeChanged { from: StatusMode, to: StatusMode },

    /// Profile text was accepted by the updater
    StatusApplied {
        /// Text as sent, after prefixing and truncation
        about: String,
    },

    /// Profile updater returned an error
    UpdateFailed { about: String, error: String },
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusEvent::ModeChanged { from, to } => write!(f, "MODE_CHANGED ({} -> {})", from, to),
            StatusEvent::StatusApplied { about } => write!(f, "STATUS_APPLIED ({:?})", about),
            StatusEvent::UpdateFailed { error, .. } => write!(f, "UPDATE_FAILED ({})", error),
        }
    }
}
