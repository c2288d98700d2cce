//! Derived per-stage state.

use super::StageId;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    /// No events recorded.
    #[default]
    Pending,
    /// Started without a terminal event yet.
    Running,
    /// Last event was a success.
    Completed,
    /// Last event was an error.
    Failed,
}

impl fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageRunStatus {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Summary of one stage, recomputed from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    /// The stage.
    pub stage: StageId,
    /// Derived status.
    pub status: StageRunStatus,
    /// Number of attempts observed.
    pub attempts: u32,
    /// First `start` timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// Timestamp of the terminal event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Last error message, only set when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StageState {
    /// A stage with no recorded events.
    #[must_use]
    pub fn pending(stage: StageId) -> Self {
        Self {
            stage,
            status: StageRunStatus::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(StageRunStatus::Completed.to_string(), "completed");
        assert_eq!(StageRunStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn test_is_terminal() {
        assert!(StageRunStatus::Failed.is_terminal());
        assert!(!StageRunStatus::Running.is_terminal());
    }

    #[test]
    fn test_pending_state_serializes_compactly() {
        let json = serde_json::to_value(StageState::pending(StageId::Cast)).unwrap();
        assert_eq!(json, serde_json::json!({"stage": "cast", "status": "pending", "attempts": 0}));
    }
}
