//! Mock executors and a scripted LLM for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::core::{StageId, StageResult, WorkflowRequest};
use crate::errors::StageError;
use crate::llm::{LlmExecutor, Prompt};
use crate::pipeline::StageRuntime;
use crate::stages::StageExecutor;

/// Executor that records every call and returns a small artifact.
///
/// The artifact is `{"stage": <id>, "call": <n>}` unless an output was set.
/// For `init` it also carries `projectId` and `titleCandidates`.
#[derive(Debug)]
pub struct RecordingExecutor {
    stage: StageId,
    output: Option<StageResult>,
    requests: Mutex<Vec<WorkflowRequest>>,
}

impl RecordingExecutor {
    /// Creates a recording executor for a stage.
    #[must_use]
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            output: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns `output` from every call.
    #[must_use]
    pub fn with_output(mut self, output: StageResult) -> Self {
        self.output = Some(output);
        self
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// The request seen by each call.
    #[must_use]
    pub fn requests(&self) -> Vec<WorkflowRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl StageExecutor for RecordingExecutor {
    async fn execute(
        &self,
        _runtime: &StageRuntime,
        request: &WorkflowRequest,
    ) -> Result<StageResult, StageError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        let mut value = serde_json::json!({ "stage": self.stage.as_str(), "call": call });
        if self.stage == StageId::Init {
            value["projectId"] = serde_json::json!("stub-project");
            value["titleCandidates"] = serde_json::json!(["The Stub Affair"]);
        }
        Ok(StageResult::new(value))
    }
}

/// Executor that fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FailingExecutor {
    stage: StageId,
    fail_times: usize,
    calls: Mutex<usize>,
}

impl FailingExecutor {
    /// Fails the first `fail_times` calls.
    #[must_use]
    pub fn new(stage: StageId, fail_times: usize) -> Self {
        Self {
            stage,
            fail_times,
            calls: Mutex::new(0),
        }
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl StageExecutor for FailingExecutor {
    async fn execute(
        &self,
        _runtime: &StageRuntime,
        _request: &WorkflowRequest,
    ) -> Result<StageResult, StageError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if call <= self.fail_times {
            return Err(StageError::Llm(format!("transient failure {call}")));
        }
        Ok(StageResult::new(
            serde_json::json!({ "stage": self.stage.as_str(), "call": call }),
        ))
    }
}

/// Review executor that returns scripted verdicts in order.
///
/// Once the script is exhausted the last entry repeats.
#[derive(Debug)]
pub struct ScriptedReviewExecutor {
    script: Mutex<VecDeque<StageResult>>,
    last: Mutex<Option<StageResult>>,
    calls: Mutex<usize>,
}

impl ScriptedReviewExecutor {
    /// Creates an executor returning `script` one entry per call.
    #[must_use]
    pub fn new(script: Vec<StageResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl StageExecutor for ScriptedReviewExecutor {
    async fn execute(
        &self,
        _runtime: &StageRuntime,
        _request: &WorkflowRequest,
    ) -> Result<StageResult, StageError> {
        *self.calls.lock() += 1;
        let mut last = self.last.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .ok_or_else(|| StageError::Validation("review script is empty".into()))
    }
}

/// Executor that sleeps before succeeding.
#[derive(Debug)]
pub struct SlowExecutor {
    stage: StageId,
    delay: Duration,
}

impl SlowExecutor {
    /// Creates an executor that takes `delay` per call.
    #[must_use]
    pub fn new(stage: StageId, delay: Duration) -> Self {
        Self { stage, delay }
    }
}

#[async_trait]
impl StageExecutor for SlowExecutor {
    async fn execute(
        &self,
        _runtime: &StageRuntime,
        _request: &WorkflowRequest,
    ) -> Result<StageResult, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(StageResult::new(serde_json::json!({ "stage": self.stage.as_str() })))
    }
}

/// LLM executor answering from queued responses.
///
/// Each profile has its own queue. Calling a profile with an empty queue
/// fails with [`StageError::Llm`].
#[derive(Debug, Default)]
pub struct StubLlm {
    plan_responses: Mutex<VecDeque<String>>,
    draft_responses: Mutex<VecDeque<String>>,
    plan_calls: Mutex<Vec<Prompt>>,
    draft_calls: Mutex<Vec<Prompt>>,
}

impl StubLlm {
    /// Creates a stub with empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues responses for `plan`.
    #[must_use]
    pub fn with_plan_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan_responses
            .lock()
            .extend(responses.into_iter().map(Into::into));
        self
    }

    /// Queues responses for `draft`.
    #[must_use]
    pub fn with_draft_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft_responses
            .lock()
            .extend(responses.into_iter().map(Into::into));
        self
    }

    /// Prompts received by `plan`.
    #[must_use]
    pub fn plan_calls(&self) -> Vec<Prompt> {
        self.plan_calls.lock().clone()
    }

    /// Prompts received by `draft`.
    #[must_use]
    pub fn draft_calls(&self) -> Vec<Prompt> {
        self.draft_calls.lock().clone()
    }
}

#[async_trait]
impl LlmExecutor for StubLlm {
    async fn plan(&self, prompt: &Prompt) -> Result<String, StageError> {
        self.plan_calls.lock().push(prompt.clone());
        self.plan_responses
            .lock()
            .pop_front()
            .ok_or_else(|| StageError::Llm("stub has no plan response left".into()))
    }

    async fn draft(&self, prompt: &Prompt) -> Result<String, StageError> {
        self.draft_calls.lock().push(prompt.clone());
        self.draft_responses
            .lock()
            .pop_front()
            .ok_or_else(|| StageError::Llm("stub has no draft response left".into()))
    }
}
