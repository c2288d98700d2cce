//! Per-stage execution settings.

use crate::core::StageId;
use serde::{Deserialize, Serialize};

/// Execution settings for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// The stage.
    pub id: StageId,
    /// Human readable label.
    pub label: String,
    /// Attempts per node entry, at least 1.
    pub retry_attempts: u32,
    /// Stages whose artifacts must exist before this one runs.
    #[serde(default)]
    pub depends_on: Vec<StageId>,
}

impl StageConfig {
    /// Default settings: planning stages (`init` through `scenes`) get two
    /// attempts, the rest one. Each stage depends on its predecessor.
    #[must_use]
    pub fn default_for(stage: StageId) -> Self {
        let retry_attempts = if stage <= StageId::Scenes { 2 } else { 1 };
        Self {
            id: stage,
            label: stage.label().to_string(),
            retry_attempts,
            depends_on: stage.predecessor().into_iter().collect(),
        }
    }

    /// Sets the attempt budget. Zero is raised to one.
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Replaces the dependency list.
    #[must_use]
    pub fn with_depends_on(mut self, deps: impl IntoIterator<Item = StageId>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Effective attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::STAGE_SEQUENCE;

    #[test]
    fn test_default_budgets() {
        assert_eq!(StageConfig::default_for(StageId::Init).retry_attempts, 2);
        assert_eq!(StageConfig::default_for(StageId::Scenes).retry_attempts, 2);
        assert_eq!(StageConfig::default_for(StageId::Draft).retry_attempts, 1);
        assert_eq!(StageConfig::default_for(StageId::Evaluate).retry_attempts, 1);
    }

    #[test]
    fn test_default_dependencies_follow_sequence() {
        assert!(StageConfig::default_for(StageId::Init).depends_on.is_empty());
        for pair in STAGE_SEQUENCE.windows(2) {
            assert_eq!(StageConfig::default_for(pair[1]).depends_on, vec![pair[0]]);
        }
    }

    #[test]
    fn test_zero_attempts_is_raised() {
        let config = StageConfig::default_for(StageId::Cast).with_retry_attempts(0);
        assert_eq!(config.max_attempts(), 1);
    }
}
