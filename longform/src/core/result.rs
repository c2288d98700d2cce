//! Opaque stage result payloads.

use crate::errors::StageError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

use super::StageId;

/// Artifacts keyed by stage, in canonical order.
pub type ArtifactMap = BTreeMap<StageId, StageResult>;

/// The validated output of a stage.
///
/// The engine treats results as opaque JSON; executors validate them against
/// their own schema types through [`StageResult::from_typed`] and
/// [`StageResult::decode`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageResult(serde_json::Value);

impl StageResult {
    /// Wraps a raw JSON value.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// An empty object payload.
    #[must_use]
    pub fn empty() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Serializes a typed schema value.
    pub fn from_typed<T: Serialize>(value: &T) -> Result<Self, StageError> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| StageError::Validation(e.to_string()))
    }

    /// Validates the payload against a schema type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StageError> {
        T::deserialize(&self.0).map_err(|e| StageError::Validation(e.to_string()))
    }

    /// Borrows the raw JSON value.
    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consumes the result, returning the raw JSON value.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for StageResult {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct ProjectCard {
        project_id: String,
        target_word_count: u32,
    }

    #[test]
    fn test_typed_round_trip() {
        let card = ProjectCard {
            project_id: "p-1".into(),
            target_word_count: 5000,
        };
        let result = StageResult::from_typed(&card).unwrap();
        assert_eq!(result.as_value()["projectId"], "p-1");
        assert_eq!(result.decode::<ProjectCard>().unwrap(), card);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let result = StageResult::new(serde_json::json!({"projectId": 3}));
        let err = result.decode::<ProjectCard>().unwrap_err();
        assert!(matches!(err, StageError::Validation(_)));
    }

    #[test]
    fn test_transparent_serialization() {
        let result = StageResult::new(serde_json::json!({"a": 1}));
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"a":1}"#);
    }
}
