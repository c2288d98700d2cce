//! LLM executor seam.
//!
//! The engine never talks to a model provider directly. Stage executors
//! reach the model through the [`LlmExecutor`] held by the stage runtime.

use crate::errors::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Prompt {
    /// System message.
    pub system: String,
    /// User message.
    pub user: String,
}

impl Prompt {
    /// Creates a prompt.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Which model profile a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmMode {
    /// Structured planning output.
    Plan,
    /// Long prose output.
    Draft,
}

impl fmt::Display for LlmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Draft => write!(f, "draft"),
        }
    }
}

/// Model capability handed to stage executors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmExecutor: Send + Sync {
    /// Runs a planning completion and returns the raw text.
    async fn plan(&self, prompt: &Prompt) -> Result<String, StageError>;

    /// Runs a drafting completion and returns the raw text.
    async fn draft(&self, prompt: &Prompt) -> Result<String, StageError>;
}

/// Dispatches a prompt to the profile named by `mode`.
pub async fn complete(
    llm: &dyn LlmExecutor,
    mode: LlmMode,
    prompt: &Prompt,
) -> Result<String, StageError> {
    match mode {
        LlmMode::Plan => llm.plan(prompt).await,
        LlmMode::Draft => llm.draft(prompt).await,
    }
}

/// Executor used when none was configured. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingLlmExecutor;

#[async_trait]
impl LlmExecutor for MissingLlmExecutor {
    async fn plan(&self, _prompt: &Prompt) -> Result<String, StageError> {
        Err(StageError::Llm("no LLM executor configured".into()))
    }

    async fn draft(&self, _prompt: &Prompt) -> Result<String, StageError> {
        Err(StageError::Llm("no LLM executor configured".into()))
    }
}
