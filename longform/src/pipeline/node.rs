//! Retry wrapper around a single stage executor.

use super::StageRuntime;
use crate::core::{StageEvent, StageId, StageResult, WorkflowRequest};
use crate::errors::{StageError, WorkflowError};
use crate::revision::{ReviewDecision, ReviewVerdict, RevisionController};
use crate::stages::{StageConfig, StageExecutor};
use tracing::{debug, warn};

/// How the run continues after a node finishes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeOutcome {
    /// The artifact was saved; move to the next stage.
    Advance,
    /// The review blocked; run the draft stage again with this directive.
    ReviseDraft(crate::core::RevisionDirective),
}

/// One stage with its settings and executor.
pub(crate) struct StageNode<'a> {
    pub config: &'a StageConfig,
    pub executor: &'a dyn StageExecutor,
}

impl StageNode<'_> {
    fn stage(&self) -> StageId {
        self.config.id
    }

    /// Runs the bounded attempt loop.
    ///
    /// Every attempt emits `start` followed by exactly one of `success` or
    /// `error`. A missing dependency fails immediately without consuming
    /// further attempts. For the review stage, `revision` decides whether
    /// the verdict advances, loops back to draft or ends the run.
    pub async fn run(
        &self,
        runtime: &StageRuntime,
        request: &WorkflowRequest,
        mut revision: Option<&mut RevisionController>,
    ) -> Result<NodeOutcome, WorkflowError> {
        let stage = self.stage();
        let max_attempts = self.config.max_attempts();

        for attempt in 1..=max_attempts {
            if runtime.is_cancelled() {
                return Err(self.cancelled(runtime));
            }

            runtime.emit(StageEvent::start(stage).with_attempt(attempt));
            debug!(trace_id = runtime.trace_id(), stage = %stage, attempt, max_attempts, "Stage attempt started");

            let missing: Vec<StageId> = self
                .config
                .depends_on
                .iter()
                .copied()
                .filter(|dep| !runtime.artifacts().contains(*dep))
                .collect();
            if !missing.is_empty() {
                let err = WorkflowError::DependencyMissing { stage, missing };
                runtime.emit(StageEvent::error(stage, err.to_string()).with_attempt(attempt));
                return Err(err);
            }

            let outcome = tokio::select! {
                biased;
                () = runtime.cancellation().cancelled() => None,
                result = self.executor.execute(runtime, request) => Some(result),
            };
            let Some(outcome) = outcome else {
                let err = self.cancelled(runtime);
                runtime.emit(StageEvent::error(stage, err.to_string()).with_attempt(attempt));
                return Err(err);
            };

            let failure = match outcome {
                Ok(result) => match revision.as_deref_mut() {
                    Some(controller) if stage == StageId::Review => {
                        match self.review(runtime, controller, result, attempt) {
                            Ok(next) => return next,
                            Err(e) => e,
                        }
                    }
                    _ => {
                        runtime.artifacts().save(stage, result);
                        runtime.emit(StageEvent::success(stage).with_attempt(attempt));
                        return Ok(NodeOutcome::Advance);
                    }
                },
                Err(e) => e,
            };

            runtime.emit(StageEvent::error(stage, failure.to_string()).with_attempt(attempt));
            if attempt == max_attempts {
                warn!(trace_id = runtime.trace_id(), stage = %stage, attempt, error = %failure, "Stage failed");
                return Err(WorkflowError::Executor {
                    stage,
                    attempts: attempt,
                    source: failure,
                });
            }
            warn!(trace_id = runtime.trace_id(), stage = %stage, attempt, error = %failure, "Stage attempt failed, retrying");
        }

        Err(WorkflowError::Configuration(format!(
            "stage {stage} has no attempts configured"
        )))
    }

    /// Applies the revision policy to a review artifact.
    ///
    /// The outer `Err` is a transient failure the attempt loop retries. The
    /// inner result is the node's final answer.
    #[allow(clippy::type_complexity)]
    fn review(
        &self,
        runtime: &StageRuntime,
        controller: &mut RevisionController,
        result: StageResult,
        attempt: u32,
    ) -> Result<Result<NodeOutcome, WorkflowError>, StageError> {
        let stage = self.stage();
        let verdict = ReviewVerdict::from_result(&result)?;

        let Some(draft) = runtime.artifact(StageId::Draft) else {
            let source = StageError::MissingInput(StageId::Draft);
            runtime.emit(StageEvent::error(stage, source.to_string()).with_attempt(attempt));
            return Ok(Err(WorkflowError::Executor {
                stage,
                attempts: attempt,
                source,
            }));
        };

        let decision = controller.assess(&verdict, &result, &draft);
        let draft_attempts = controller.draft_runs();
        Ok(match decision {
            ReviewDecision::Advance => {
                runtime.artifacts().save(stage, result);
                runtime.emit(StageEvent::success(stage).with_attempt(attempt));
                Ok(NodeOutcome::Advance)
            }
            ReviewDecision::Revise { directive, reason } => {
                runtime.artifacts().save(stage, result);
                runtime.emit(
                    StageEvent::error(stage, reason)
                        .with_attempt(attempt)
                        .with_meta("revision", serde_json::json!(directive.attempt))
                        .with_meta("maxAttempts", serde_json::json!(directive.max_attempts)),
                );
                Ok(NodeOutcome::ReviseDraft(directive))
            }
            ReviewDecision::Exhausted { reason } => {
                runtime.emit(
                    StageEvent::error(stage, reason.clone())
                        .with_attempt(attempt)
                        .with_meta("draftAttempts", serde_json::json!(draft_attempts)),
                );
                Err(WorkflowError::ReviewBlocked {
                    verdict,
                    draft_attempts,
                    message: reason,
                })
            }
        })
    }

    fn cancelled(&self, runtime: &StageRuntime) -> WorkflowError {
        let reason = runtime
            .cancellation()
            .reason()
            .unwrap_or_else(|| "cancelled".to_string());
        debug!(trace_id = runtime.trace_id(), stage = %self.stage(), reason = %reason, "Stage cancelled");
        WorkflowError::Cancelled(reason)
    }
}
