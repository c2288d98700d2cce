//! Stage lifecycle events.

use super::StageId;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status carried by a [`StageEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// An attempt started.
    Start,
    /// An attempt finished and its artifact was saved.
    Success,
    /// An attempt failed, or the review verdict blocked advancement.
    Error,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An event in the append-only run history.
///
/// The event log is the single source of truth for run telemetry; every
/// [`StageState`](super::StageState) is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    /// The stage the event belongs to.
    pub stage: StageId,

    /// Lifecycle status.
    pub status: EventStatus,

    /// When the event occurred.
    pub timestamp: Timestamp,

    /// Optional human readable message (error text, blocking reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Optional structured metadata (attempt number, revision round).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl StageEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(stage: StageId, status: EventStatus) -> Self {
        Self {
            stage,
            status,
            timestamp: crate::utils::now_utc(),
            message: None,
            meta: None,
        }
    }

    /// Creates a `start` event.
    #[must_use]
    pub fn start(stage: StageId) -> Self {
        Self::new(stage, EventStatus::Start)
    }

    /// Creates a `success` event.
    #[must_use]
    pub fn success(stage: StageId) -> Self {
        Self::new(stage, EventStatus::Success)
    }

    /// Creates an `error` event with a message.
    #[must_use]
    pub fn error(stage: StageId, message: impl Into<String>) -> Self {
        Self::new(stage, EventStatus::Error).with_message(message)
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a metadata field.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// Shorthand for the `attempt` metadata field.
    #[must_use]
    pub fn with_attempt(self, attempt: u32) -> Self {
        self.with_meta("attempt", serde_json::json!(attempt))
    }

    /// Reads the `attempt` metadata field.
    #[must_use]
    pub fn attempt(&self) -> Option<u64> {
        self.meta.as_ref()?.get("attempt")?.as_u64()
    }
}
