//! Stage executor trait and implementations.
//!
//! A stage executor turns the run state visible through a
//! [`StageRuntime`] plus the caller's [`WorkflowRequest`] into one
//! validated [`StageResult`]. Executors never save artifacts or emit
//! lifecycle events themselves; the engine's retry wrapper does both.

mod config;
mod registry;

pub use config::StageConfig;
pub use registry::StageRegistry;

use crate::core::{StageId, StageResult, WorkflowRequest};
use crate::errors::StageError;
use crate::pipeline::StageRuntime;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Trait for stage executors.
#[async_trait]
pub trait StageExecutor: Send + Sync + Debug {
    /// Runs the stage once.
    ///
    /// Any error is treated as transient and retried up to the stage's
    /// attempt budget.
    async fn execute(
        &self,
        runtime: &StageRuntime,
        request: &WorkflowRequest,
    ) -> Result<StageResult, StageError>;
}

/// An async function-based executor.
///
/// The closure receives clones of the runtime and request so the returned
/// future can own them.
pub struct FnExecutor<F, Fut>
where
    F: Fn(StageRuntime, WorkflowRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnExecutor<F, Fut>
where
    F: Fn(StageRuntime, WorkflowRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    /// Creates a new function-based executor.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for FnExecutor<F, Fut>
where
    F: Fn(StageRuntime, WorkflowRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> StageExecutor for FnExecutor<F, Fut>
where
    F: Fn(StageRuntime, WorkflowRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StageResult, StageError>> + Send,
{
    async fn execute(
        &self,
        runtime: &StageRuntime,
        request: &WorkflowRequest,
    ) -> Result<StageResult, StageError> {
        (self.func)(runtime.clone(), request.clone()).await
    }
}

/// Wraps an executor so seeded artifacts short-circuit it.
///
/// When `request.overrides` holds an artifact for the stage, that artifact
/// is returned without calling the inner executor. This is how stages
/// restored from the stage cache are skipped on resume.
///
/// While a draft revision is pending, seeds for `draft` and `review` are
/// ignored: both must run fresh against the revised draft.
#[derive(Debug)]
pub struct SeedAware {
    stage: StageId,
    inner: Arc<dyn StageExecutor>,
}

impl SeedAware {
    /// Wraps `inner` for `stage`.
    #[must_use]
    pub fn new(stage: StageId, inner: Arc<dyn StageExecutor>) -> Self {
        Self { stage, inner }
    }

    fn seed_applies(&self, request: &WorkflowRequest) -> bool {
        let revising = request.draft_revision().is_some();
        !(revising && matches!(self.stage, StageId::Draft | StageId::Review))
    }
}

#[async_trait]
impl StageExecutor for SeedAware {
    async fn execute(
        &self,
        runtime: &StageRuntime,
        request: &WorkflowRequest,
    ) -> Result<StageResult, StageError> {
        if self.seed_applies(request) {
            if let Some(seed) = request.overrides.get(&self.stage) {
                debug!(trace_id = runtime.trace_id(), stage = %self.stage, "Using seeded artifact");
                return Ok(seed.clone());
            }
        }
        self.inner.execute(runtime, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RevisionDirective;
    use crate::testing::{test_runtime, RecordingExecutor};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fn_executor() {
        let executor = FnExecutor::new("echo", |runtime: StageRuntime, request: WorkflowRequest| async move {
            Ok::<_, StageError>(StageResult::new(serde_json::json!({
                "trace": runtime.trace_id(),
                "instructions": request.instructions,
            })))
        });

        let runtime = test_runtime();
        let result = executor
            .execute(&runtime, &WorkflowRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(result.as_value()["instructions"], "hi");
        assert_eq!(result.as_value()["trace"], runtime.trace_id());
    }

    #[tokio::test]
    async fn test_seed_short_circuits() {
        let inner = Arc::new(RecordingExecutor::new(StageId::Cast));
        let executor = SeedAware::new(StageId::Cast, inner.clone());
        let seed = StageResult::new(serde_json::json!({"seeded": true}));
        let request = WorkflowRequest::new("x").with_override(StageId::Cast, seed.clone());

        let result = executor.execute(&test_runtime(), &request).await.unwrap();
        assert_eq!(result, seed);
        assert_eq!(inner.call_count(), 0);

        executor
            .execute(&test_runtime(), &WorkflowRequest::new("x"))
            .await
            .unwrap();
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_seed_ignored_while_revising() {
        let inner = Arc::new(RecordingExecutor::new(StageId::Draft));
        let executor = SeedAware::new(StageId::Draft, inner.clone());
        let mut request =
            WorkflowRequest::new("x").with_override(StageId::Draft, StageResult::empty());
        request.revision_context.draft = Some(RevisionDirective {
            attempt: 2,
            max_attempts: 3,
            previous_draft: StageResult::empty(),
            feedback: StageResult::empty(),
        });

        executor.execute(&test_runtime(), &request).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }
}
