//! Test fixtures: review verdicts, registries and runtimes.

use std::sync::Arc;

use super::RecordingExecutor;
use crate::cancellation::CancellationToken;
use crate::core::{StageResult, STAGE_SEQUENCE};
use crate::effects::SideEffects;
use crate::events::EventBus;
use crate::llm::{LlmExecutor, MissingLlmExecutor};
use crate::pipeline::{StageRuntime, WorkflowContext};
use crate::stages::StageRegistry;
use crate::store::MemoryArtifactStore;

/// Trace id used by [`test_runtime`].
pub const TEST_TRACE_ID: &str = "trace-test";

/// A review artifact with no issues.
#[must_use]
pub fn clean_review() -> StageResult {
    StageResult::new(serde_json::json!({
        "mustFix": [],
        "warnings": [],
        "summary": "Ready for polish",
    }))
}

/// A review artifact with one blocking issue.
#[must_use]
pub fn blocking_review(issue: &str) -> StageResult {
    StageResult::new(serde_json::json!({
        "mustFix": [issue],
        "warnings": [],
    }))
}

/// A review artifact with one warning and no blocking issue.
#[must_use]
pub fn warning_review(warning: &str) -> StageResult {
    StageResult::new(serde_json::json!({
        "mustFix": [],
        "warnings": [warning],
    }))
}

/// A registry with a [`RecordingExecutor`] for every stage.
#[must_use]
pub fn stub_registry() -> StageRegistry {
    STAGE_SEQUENCE
        .iter()
        .fold(StageRegistry::new(), |registry, stage| {
            registry.with(*stage, Arc::new(RecordingExecutor::new(*stage)))
        })
}

/// A runtime over an empty in-memory store with no LLM.
#[must_use]
pub fn test_runtime() -> StageRuntime {
    runtime_with_llm(Arc::new(MissingLlmExecutor))
}

/// A runtime over an empty in-memory store using `llm`.
#[must_use]
pub fn runtime_with_llm(llm: Arc<dyn LlmExecutor>) -> StageRuntime {
    let context = Arc::new(WorkflowContext::new(
        TEST_TRACE_ID,
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(EventBus::new()),
        Arc::new(CancellationToken::new()),
    ));
    StageRuntime::new(context, llm, SideEffects::new())
}
