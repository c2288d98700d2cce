//! Per-run workflow context and the runtime handed to stage executors.

use crate::cancellation::CancellationToken;
use crate::core::{EventStatus, StageEvent, StageId, StageResult};
use crate::effects::{SideEffectKind, SideEffects};
use crate::events::EventBus;
use crate::llm::LlmExecutor;
use crate::persistence::{persist_versioned_output, VersionedOutput};
use crate::store::ArtifactStore;
use crate::utils::{now_utc, Timestamp};
use std::path::PathBuf;
use std::sync::Arc;

/// State owned by one `invoke()` call.
///
/// Created per run, seeded from the cache and the request overrides, and
/// dropped when the run ends.
#[derive(Debug)]
pub struct WorkflowContext {
    trace_id: String,
    created_at: Timestamp,
    artifacts: Arc<dyn ArtifactStore>,
    bus: Arc<EventBus>,
    cancel: Arc<CancellationToken>,
}

impl WorkflowContext {
    /// Creates a context stamped with the current time.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        artifacts: Arc<dyn ArtifactStore>,
        bus: Arc<EventBus>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            created_at: now_utc(),
            artifacts,
            bus,
            cancel,
        }
    }

    /// The run's trace id.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// When the context was created.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// The artifact store.
    #[must_use]
    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    /// The run's event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }
}

/// Capabilities available to a stage executor. Cheap to clone.
#[derive(Clone)]
pub struct StageRuntime {
    context: Arc<WorkflowContext>,
    llm: Arc<dyn LlmExecutor>,
    effects: SideEffects,
    output_root: Option<PathBuf>,
}

impl std::fmt::Debug for StageRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRuntime")
            .field("trace_id", &self.trace_id())
            .field("output_root", &self.output_root)
            .finish_non_exhaustive()
    }
}

impl StageRuntime {
    /// Creates a runtime over a run context.
    #[must_use]
    pub fn new(context: Arc<WorkflowContext>, llm: Arc<dyn LlmExecutor>, effects: SideEffects) -> Self {
        Self {
            context,
            llm,
            effects,
            output_root: None,
        }
    }

    /// Sets the directory for versioned outputs.
    #[must_use]
    pub fn with_output_root(mut self, root: Option<PathBuf>) -> Self {
        self.output_root = root;
        self
    }

    /// The run context.
    #[must_use]
    pub fn context(&self) -> &Arc<WorkflowContext> {
        &self.context
    }

    /// The run's trace id.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        self.context.trace_id()
    }

    /// When the run started.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.context.created_at()
    }

    /// The artifact store.
    #[must_use]
    pub fn artifacts(&self) -> &dyn ArtifactStore {
        self.context.artifacts().as_ref()
    }

    /// Returns a saved artifact.
    #[must_use]
    pub fn artifact(&self, stage: StageId) -> Option<StageResult> {
        self.context.artifacts().get(stage)
    }

    /// Returns a saved artifact or [`StageError::MissingInput`](crate::errors::StageError::MissingInput).
    pub fn require(&self, stage: StageId) -> Result<StageResult, crate::errors::StageError> {
        self.artifact(stage)
            .ok_or(crate::errors::StageError::MissingInput(stage))
    }

    /// The LLM executor.
    #[must_use]
    pub fn llm(&self) -> &dyn LlmExecutor {
        self.llm.as_ref()
    }

    /// The run's event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        self.context.bus()
    }

    /// Emits an event on the run's bus.
    pub fn emit(&self, event: StageEvent) {
        self.context.bus().emit(event);
    }

    /// The cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        self.context.cancellation()
    }

    /// Returns whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.context.cancellation().is_cancelled()
    }

    /// The side-effect tracker.
    #[must_use]
    pub fn effects(&self) -> &SideEffects {
        &self.effects
    }

    /// Number of `success` events recorded for a stage in this run.
    #[must_use]
    pub fn successful_runs(&self, stage: StageId) -> u32 {
        let count = self
            .context
            .bus()
            .list()
            .iter()
            .filter(|e| e.stage == stage && e.status == EventStatus::Success)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Writes a versioned output under the configured output root.
    ///
    /// Returns `None` when no output root is configured or the write failed;
    /// failures are recorded as side-effect failures.
    pub async fn persist_versioned_output(
        &self,
        label: &str,
        content: &str,
        attempt: Option<u32>,
    ) -> Option<VersionedOutput> {
        let root = self.output_root.as_ref()?;
        match persist_versioned_output(root, self.trace_id(), label, content, self.created_at(), attempt)
            .await
        {
            Ok(output) => Some(output),
            Err(e) => {
                self.effects.record(
                    SideEffectKind::VersionedOutput,
                    format!("{}/{}", self.trace_id(), label),
                    e.to_string(),
                );
                None
            }
        }
    }
}
