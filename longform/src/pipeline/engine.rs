//! The workflow engine: runs the fixed stage sequence for one request.

use super::builder::WorkflowEngineBuilder;
use super::node::{NodeOutcome, StageNode};
use super::{StageRuntime, WorkflowContext};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::{
    ArtifactMap, StageEvent, StageId, StageResult, StageState, WorkflowRequest, WorkflowResult,
    WorkflowTelemetry,
};
use crate::effects::{SideEffectFailure, SideEffectKind, SideEffects};
use crate::errors::{StageExecutionError, WorkflowError};
use crate::events::{EventBus, LoggingEventSink, Subscription};
use crate::llm::LlmExecutor;
use crate::observability::{derive_stage_states, log_run_summary};
use crate::persistence::{append_entry, QaBoardEntry, StageCache};
use crate::revision::RevisionController;
use crate::stages::{StageConfig, StageRegistry};
use crate::store::{ArtifactStore, CachedArtifactStore, MemoryArtifactStore};
use crate::utils::{generate_trace_id, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the longform stage sequence.
///
/// Each [`invoke`](Self::invoke) gets its own trace id, artifact store,
/// event log and cancellation token. Listeners registered with
/// [`on_event`](Self::on_event) see the events of every run.
pub struct WorkflowEngine {
    pub(super) registry: StageRegistry,
    pub(super) configs: BTreeMap<StageId, StageConfig>,
    pub(super) sequence: Vec<StageId>,
    pub(super) llm: Arc<dyn LlmExecutor>,
    pub(super) store: Option<Arc<dyn ArtifactStore>>,
    pub(super) hub: Arc<EventBus>,
    pub(super) config: EngineConfig,
    pub(super) effects: SideEffects,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("sequence", &self.sequence)
            .field("config", &self.config)
            .field("listeners", &self.hub.listener_count())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new()
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The stages this engine runs, in order.
    #[must_use]
    pub fn sequence(&self) -> &[StageId] {
        &self.sequence
    }

    /// Settings for a stage of the sequence.
    #[must_use]
    pub fn stage_config(&self, stage: StageId) -> Option<&StageConfig> {
        self.configs.get(&stage)
    }

    /// Registers a listener for the events of every subsequent run.
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.hub.subscribe(listener)
    }

    /// Drops every `on_event` registration.
    pub fn dispose(&self) {
        debug!(listeners = self.hub.listener_count(), "Disposing workflow engine listeners");
        self.hub.clear_listeners();
    }

    /// Waits for outstanding cache writes and QA board appends.
    pub async fn flush_side_effects(&self) {
        self.effects.flush().await;
    }

    /// Side effects that failed so far.
    #[must_use]
    pub fn side_effect_failures(&self) -> Vec<SideEffectFailure> {
        self.effects.failures()
    }

    /// Runs the sequence for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`StageExecutionError`] carrying the saved artifacts and the
    /// trace id when a stage fails for good.
    pub async fn invoke(&self, request: WorkflowRequest) -> Result<WorkflowResult, StageExecutionError> {
        self.invoke_with_cancel(request, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs the sequence, stopping early once `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke). Cancellation surfaces as
    /// [`WorkflowError::Cancelled`] in the error's `cause`.
    pub async fn invoke_with_cancel(
        &self,
        mut request: WorkflowRequest,
        cancel: Arc<CancellationToken>,
    ) -> Result<WorkflowResult, StageExecutionError> {
        let trace_id = request
            .trace_id
            .clone()
            .unwrap_or_else(generate_trace_id);
        request.trace_id = Some(trace_id.clone());

        let cache = self.config.cache_root.as_ref().map(StageCache::new);
        let seeded = self.seed_artifacts(&request, cache.as_ref()).await;
        request.overrides = seeded.clone();

        let run_trace = trace_id.clone();
        cancel.on_cancel(move |reason| {
            info!(trace_id = %run_trace, reason, "Workflow run cancellation requested");
        });

        let runtime = self.build_runtime(&trace_id, seeded, cache, cancel);
        info!(
            trace_id = %trace_id,
            stages = self.sequence.len(),
            seeded = request.overrides.len(),
            "Workflow run started"
        );

        let outcome = self.run_sequence(&runtime, &mut request).await;

        let events = runtime.bus().list();
        let stages = derive_stage_states(&events, &self.sequence);
        let artifacts = runtime.artifacts().dump();
        let created_at = runtime.created_at();

        match outcome {
            Ok(()) => {
                self.record_qa_summary(&trace_id, created_at, &artifacts, &events, None);
                log_run_summary(&trace_id, &stages, None);
                Ok(WorkflowResult {
                    trace_id,
                    created_at,
                    stages,
                    artifacts,
                    telemetry: WorkflowTelemetry { events },
                })
            }
            Err((stage, cause)) => {
                let mut qa_artifacts = artifacts.clone();
                if let WorkflowError::ReviewBlocked { verdict, .. } = &cause {
                    if let Ok(review) = StageResult::from_typed(verdict) {
                        qa_artifacts.insert(StageId::Review, review);
                    }
                }
                self.record_qa_summary(
                    &trace_id,
                    created_at,
                    &qa_artifacts,
                    &events,
                    Some((stage, cause.to_string())),
                );
                log_run_summary(&trace_id, &stages, Some(stage.as_str()));

                let state = stages
                    .iter()
                    .find(|s| s.stage == stage)
                    .cloned()
                    .unwrap_or_else(|| StageState::pending(stage));

                Err(StageExecutionError {
                    stage,
                    state,
                    artifacts,
                    trace_id,
                    cause,
                })
            }
        }
    }

    /// Cached artifacts for the trace, with explicit overrides on top.
    async fn seed_artifacts(&self, request: &WorkflowRequest, cache: Option<&StageCache>) -> ArtifactMap {
        let resume = request.resume_from_cache.unwrap_or(cache.is_some());
        let mut seeded = match (resume, cache, request.trace_id.as_deref()) {
            (true, Some(cache), Some(trace_id)) => cache.read_all(trace_id).await,
            _ => ArtifactMap::new(),
        };
        if !seeded.is_empty() {
            debug!(trace_id = ?request.trace_id, cached = seeded.len(), "Resuming from stage cache");
        }
        seeded.extend(request.overrides.clone());
        seeded
    }

    fn build_runtime(
        &self,
        trace_id: &str,
        seeded: ArtifactMap,
        cache: Option<StageCache>,
        cancel: Arc<CancellationToken>,
    ) -> StageRuntime {
        let store: Arc<dyn ArtifactStore> = match (&self.store, cache) {
            (Some(store), _) => {
                for (stage, result) in seeded {
                    store.save(stage, result);
                }
                Arc::clone(store)
            }
            (None, Some(cache)) => Arc::new(CachedArtifactStore::new(
                trace_id,
                cache,
                seeded,
                self.effects.clone(),
            )),
            (None, None) => Arc::new(MemoryArtifactStore::with_initial(seeded)),
        };

        let bus = Arc::new(EventBus::new());
        let hub = Arc::clone(&self.hub);
        bus.subscribe(move |event| hub.emit(event.clone()));
        bus.subscribe_sink(Arc::new(LoggingEventSink::debug().with_trace_id(trace_id)));

        let context = Arc::new(WorkflowContext::new(trace_id, store, bus, cancel));
        StageRuntime::new(context, Arc::clone(&self.llm), self.effects.clone())
            .with_output_root(self.config.output_root.clone())
    }

    /// Walks the sequence. Review may send the walk back to draft.
    ///
    /// On failure returns the stage the run stopped at.
    async fn run_sequence(
        &self,
        runtime: &StageRuntime,
        request: &mut WorkflowRequest,
    ) -> Result<(), (StageId, WorkflowError)> {
        let mut controller =
            RevisionController::new(self.config.draft_budget(), self.config.fail_on_warnings);
        let mut index = 0;

        while let Some(&stage) = self.sequence.get(index) {
            let (config, executor) = self.node_parts(stage).map_err(|e| (stage, e))?;
            let node = StageNode {
                config,
                executor: executor.as_ref(),
            };
            let revision = (stage == StageId::Review).then_some(&mut controller);

            match node.run(runtime, request, revision).await {
                Ok(NodeOutcome::Advance) => {
                    match stage {
                        StageId::Draft => controller.record_draft_success(),
                        StageId::Review => request.revision_context.draft = None,
                        _ => {}
                    }
                    index += 1;
                }
                Ok(NodeOutcome::ReviseDraft(directive)) => {
                    request.revision_context.draft = Some(directive);
                    index = self
                        .sequence
                        .iter()
                        .position(|s| *s == StageId::Draft)
                        .ok_or_else(|| {
                            (
                                stage,
                                WorkflowError::Configuration(
                                    "review requested a revision but draft is not in the sequence"
                                        .into(),
                                ),
                            )
                        })?;
                }
                Err(e) => return Err((stage, e)),
            }
        }
        Ok(())
    }

    fn node_parts(
        &self,
        stage: StageId,
    ) -> Result<(&StageConfig, Arc<dyn crate::stages::StageExecutor>), WorkflowError> {
        let config = self
            .configs
            .get(&stage)
            .ok_or_else(|| WorkflowError::Configuration(format!("no config for stage {stage}")))?;
        let executor = self
            .registry
            .get(stage)
            .ok_or_else(|| WorkflowError::Configuration(format!("no executor for stage {stage}")))?;
        Ok((config, executor))
    }

    fn record_qa_summary(
        &self,
        trace_id: &str,
        created_at: Timestamp,
        artifacts: &ArtifactMap,
        events: &[StageEvent],
        failure: Option<(StageId, String)>,
    ) {
        let Some(root) = self.config.effective_qa_board_root().cloned() else {
            return;
        };
        let entry = QaBoardEntry::summarize(trace_id, created_at, artifacts, events, failure);
        self.effects
            .spawn(SideEffectKind::QaBoard, trace_id, async move {
                let path = append_entry(&root, entry).await?;
                debug!(path = %path.display(), "QA board updated");
                Ok::<_, crate::errors::QaBoardError>(())
            });
    }
}
