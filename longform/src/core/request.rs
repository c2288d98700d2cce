//! Workflow request and result types.

use super::{ArtifactMap, StageEvent, StageId, StageResult, StageState};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// Instructions handed to the draft executor while the revision loop is
/// active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDirective {
    /// The draft attempt this directive asks for (2 for the first revision).
    pub attempt: u32,
    /// Total draft attempts allowed (`1 + max_auto_revisions`).
    pub max_attempts: u32,
    /// The draft artifact that was reviewed.
    pub previous_draft: StageResult,
    /// The blocking review verdict.
    pub feedback: StageResult,
}

/// Revision state attached to the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionContext {
    /// Pending directive for the draft stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<RevisionDirective>,
}

/// Input to [`WorkflowEngine::invoke`](crate::pipeline::WorkflowEngine::invoke).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    /// Free-form user instructions.
    pub instructions: String,

    /// Artifacts seeded before execution. Seeded stages satisfy dependency
    /// checks; seed-aware executors return them instead of running.
    #[serde(default, skip_serializing_if = "ArtifactMap::is_empty")]
    pub overrides: ArtifactMap,

    /// Trace id to use; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Whether to seed from the persistent cache. Defaults to true when a
    /// cache root is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from_cache: Option<bool>,

    /// Revision loop state, managed by the engine.
    #[serde(default)]
    pub revision_context: RevisionContext,
}

impl WorkflowRequest {
    /// Creates a request with instructions only.
    #[must_use]
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    /// Sets the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Seeds an artifact for a stage.
    #[must_use]
    pub fn with_override(mut self, stage: StageId, result: StageResult) -> Self {
        self.overrides.insert(stage, result);
        self
    }

    /// Sets whether to resume from the persistent cache.
    #[must_use]
    pub fn with_resume_from_cache(mut self, resume: bool) -> Self {
        self.resume_from_cache = Some(resume);
        self
    }

    /// The pending draft directive, if the revision loop is active.
    #[must_use]
    pub fn draft_revision(&self) -> Option<&RevisionDirective> {
        self.revision_context.draft.as_ref()
    }
}

/// Raw run telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTelemetry {
    /// Every event emitted during the run, in order.
    pub events: Vec<StageEvent>,
}

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    /// Trace id correlating events, cache files and outputs.
    pub trace_id: String,
    /// When the run context was created.
    pub created_at: Timestamp,
    /// Derived state per stage, in canonical order.
    pub stages: Vec<StageState>,
    /// Final artifacts.
    pub artifacts: ArtifactMap,
    /// Event log.
    pub telemetry: WorkflowTelemetry,
}

impl WorkflowResult {
    /// Looks up the derived state of a stage.
    #[must_use]
    pub fn stage(&self, stage: StageId) -> Option<&StageState> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}
