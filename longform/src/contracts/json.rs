//! JSON extraction and typed parsing of model output.

use crate::core::StageResult;
use crate::errors::StageError;
use crate::llm::{complete, LlmMode, Prompt};
use crate::pipeline::StageRuntime;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static FENCE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").ok());

/// Extracts the JSON text from raw model output.
///
/// A leading code fence wins; otherwise the span from the first `{` to the
/// last `}` is taken.
pub fn extract_json(raw: &str) -> Result<&str, StageError> {
    let trimmed = raw.trim();

    if trimmed.starts_with("```") {
        let fenced = FENCE_REGEX
            .as_ref()
            .and_then(|re| re.captures(trimmed))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|body| !body.is_empty());
        if let Some(body) = fenced {
            return Ok(body);
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(first), Some(last)) if last > first => Ok(&trimmed[first..=last]),
        _ => Err(StageError::Parse("no JSON object found in model output".into())),
    }
}

/// Extracts and validates model output against `T`.
///
/// Malformed JSON is a [`StageError::Parse`]; JSON that does not match the
/// schema is a [`StageError::Validation`].
pub fn parse_typed<T: DeserializeOwned>(raw: &str) -> Result<T, StageError> {
    let text = extract_json(raw)?;
    let value: serde_json::Value = serde_json::from_str(text)?;
    serde_json::from_value(value).map_err(|e| StageError::Validation(e.to_string()))
}

/// Calls the model, then validates its output against `T`.
pub async fn invoke_and_parse<T>(
    runtime: &StageRuntime,
    mode: LlmMode,
    prompt: &Prompt,
) -> Result<StageResult, StageError>
where
    T: DeserializeOwned + Serialize,
{
    let raw = complete(runtime.llm(), mode, prompt).await?;
    debug!(trace_id = runtime.trace_id(), %mode, bytes = raw.len(), "Model output received");
    let typed: T = parse_typed(&raw)?;
    StageResult::from_typed(&typed)
}
