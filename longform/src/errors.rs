//! Error types for the longform workflow engine.
//!
//! The taxonomy follows how a failure is handled:
//! - [`StageError`]: a stage executor failed (retried up to the stage budget)
//! - [`WorkflowError`]: why a run stopped (dependency defect, exhausted
//!   retries, exhausted revision budget, cancellation, configuration)
//! - [`StageExecutionError`]: what `invoke()` returns on failure, carrying
//!   the partial artifacts and the trace id needed to resume
//! - [`CacheError`] / [`QaBoardError`]: side-effect failures, never surfaced
//!   by a run

use crate::core::{ArtifactMap, StageId, StageState, WorkflowRequest};
use crate::revision::ReviewVerdict;
use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by a stage executor.
///
/// Every variant is treated as transient by the retry wrapper.
#[derive(Debug, Error)]
pub enum StageError {
    /// The LLM call failed.
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// The model output did not contain parseable JSON.
    #[error("Failed to parse stage output: {0}")]
    Parse(String),

    /// The payload did not match the stage schema.
    #[error("Stage output failed validation: {0}")]
    Validation(String),

    /// An artifact the executor reads was not available.
    #[error("Missing input artifact: {0}")]
    MissingInput(StageId),

    /// Any other executor failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Why a workflow run stopped.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A stage ran before its dependencies were saved. Never retried.
    #[error("Missing dependencies: {}", join_stages(missing))]
    DependencyMissing {
        /// The stage that could not run.
        stage: StageId,
        /// The dependencies without an artifact.
        missing: Vec<StageId>,
    },

    /// A stage executor failed on its final attempt.
    #[error("{source}")]
    Executor {
        /// The failing stage.
        stage: StageId,
        /// Attempts consumed.
        attempts: u32,
        /// The last executor error.
        #[source]
        source: StageError,
    },

    /// The review kept reporting blocking issues after the revision budget
    /// was spent.
    #[error("{message}")]
    ReviewBlocked {
        /// Last verdict.
        verdict: ReviewVerdict,
        /// Successful draft executions in this run.
        draft_attempts: u32,
        /// Human readable blocking reason.
        message: String,
    },

    /// The run was cancelled.
    #[error("Workflow cancelled: {0}")]
    Cancelled(String),

    /// The engine was built or invoked with an invalid configuration.
    #[error("Invalid workflow configuration: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Returns true for errors that stopped the run through cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

fn join_stages(stages: &[StageId]) -> String {
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Terminal failure returned by `invoke()`.
///
/// Carries everything learned so far so the caller can resume the run with
/// the same trace id instead of restarting.
#[derive(Debug, Error)]
#[error("Stage {stage} failed: {}", state.error_message.clone().unwrap_or_else(|| cause.to_string()))]
pub struct StageExecutionError {
    /// The stage whose error ended the run.
    pub stage: StageId,
    /// Derived state of that stage.
    pub state: StageState,
    /// Artifacts saved before the failure.
    pub artifacts: ArtifactMap,
    /// Trace id of the failed run.
    pub trace_id: String,
    /// Underlying cause.
    #[source]
    pub cause: WorkflowError,
}

impl StageExecutionError {
    /// Builds a request that resumes this run from the persistent cache,
    /// seeding the artifacts gathered so far.
    #[must_use]
    pub fn resume_request(&self, instructions: impl Into<String>) -> WorkflowRequest {
        WorkflowRequest {
            instructions: instructions.into(),
            overrides: self.artifacts.clone(),
            trace_id: Some(self.trace_id.clone()),
            resume_from_cache: Some(true),
            ..Default::default()
        }
    }
}

/// Persistent stage cache failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("Cache IO error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be (de)serialized.
    #[error("Cache entry {path} is invalid: {source}")]
    Serialization {
        /// The cache file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Entry belongs to another trace or stage than its file name claims.
    #[error("Cache entry {0} does not match its trace id or stage")]
    Mismatch(PathBuf),
}

/// QA board or versioned output failure.
#[derive(Debug, Error)]
pub enum QaBoardError {
    /// Filesystem failure.
    #[error("QA board IO error at {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be serialized.
    #[error("QA board serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking writer task panicked or was cancelled.
    #[error("QA board writer task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_missing_message() {
        let err = WorkflowError::DependencyMissing {
            stage: StageId::Structure,
            missing: vec![StageId::Clues, StageId::Cast],
        };
        assert_eq!(err.to_string(), "Missing dependencies: clues, cast");
    }

    #[test]
    fn test_executor_error_uses_source_message() {
        let err = WorkflowError::Executor {
            stage: StageId::Draft,
            attempts: 2,
            source: StageError::Llm("timeout".into()),
        };
        assert_eq!(err.to_string(), "LLM call failed: timeout");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_stage_error_from_anyhow() {
        let err: StageError = anyhow::anyhow!("socket closed").into();
        assert_eq!(err.to_string(), "socket closed");
    }

    #[test]
    fn test_execution_error_display_and_resume() {
        let mut state = StageState::pending(StageId::Review);
        state.error_message = Some("blocked".into());
        let err = StageExecutionError {
            stage: StageId::Review,
            state,
            artifacts: ArtifactMap::new(),
            trace_id: "trace-9".into(),
            cause: WorkflowError::Cancelled("stop".into()),
        };

        assert_eq!(err.to_string(), "Stage review failed: blocked");

        let untouched = StageExecutionError {
            state: StageState::pending(StageId::Review),
            ..err
        };
        assert_eq!(untouched.to_string(), "Stage review failed: Workflow cancelled: stop");
        let err = untouched;
        let request = err.resume_request("again");
        assert_eq!(request.trace_id.as_deref(), Some("trace-9"));
        assert_eq!(request.resume_from_cache, Some(true));
        assert!(err.cause.is_cancelled());
    }
}
