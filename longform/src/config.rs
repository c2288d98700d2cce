//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Environment variable for [`EngineConfig::max_auto_revisions`].
pub const ENV_MAX_AUTO_REVISIONS: &str = "LONGFORM_MAX_AUTO_REVISIONS";
/// Environment variable for [`EngineConfig::fail_on_warnings`].
pub const ENV_FAIL_ON_WARN: &str = "LONGFORM_FAIL_ON_WARN";
/// Environment variable for [`EngineConfig::cache_root`].
pub const ENV_CACHE_DIR: &str = "LONGFORM_CACHE_DIR";
/// Environment variable for [`EngineConfig::qa_board_root`].
pub const ENV_QA_BOARD: &str = "LONGFORM_QA_BOARD";
/// Environment variable for [`EngineConfig::output_root`].
pub const ENV_OUTPUT_DIR: &str = "LONGFORM_OUTPUT_DIR";

/// Workflow engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extra draft rounds the review may request. The draft budget is
    /// `1 + max_auto_revisions`.
    #[serde(default = "default_max_auto_revisions")]
    pub max_auto_revisions: u32,

    /// Treat review warnings as blocking.
    #[serde(default)]
    pub fail_on_warnings: bool,

    /// Persistent stage cache directory.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,

    /// Directory holding `qa-board.json`. Falls back to `output_root`.
    #[serde(default)]
    pub qa_board_root: Option<PathBuf>,

    /// Directory for versioned output artifacts.
    #[serde(default)]
    pub output_root: Option<PathBuf>,
}

fn default_max_auto_revisions() -> u32 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_auto_revisions: default_max_auto_revisions(),
            fail_on_warnings: false,
            cache_root: None,
            qa_board_root: None,
            output_root: None,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults and no filesystem sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from `LONGFORM_*` environment variables.
    ///
    /// Malformed numbers fall back to the default with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_auto_revisions = match non_empty(ENV_MAX_AUTO_REVISIONS) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid {}, using default", ENV_MAX_AUTO_REVISIONS);
                default_max_auto_revisions()
            }),
            None => default_max_auto_revisions(),
        };

        let fail_on_warnings = non_empty(ENV_FAIL_ON_WARN)
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"));

        Self {
            max_auto_revisions,
            fail_on_warnings,
            cache_root: non_empty(ENV_CACHE_DIR).map(PathBuf::from),
            qa_board_root: non_empty(ENV_QA_BOARD).map(PathBuf::from),
            output_root: non_empty(ENV_OUTPUT_DIR).map(PathBuf::from),
        }
    }

    /// Sets the revision budget.
    #[must_use]
    pub fn with_max_auto_revisions(mut self, rounds: u32) -> Self {
        self.max_auto_revisions = rounds;
        self
    }

    /// Treats review warnings as blocking.
    #[must_use]
    pub fn with_fail_on_warnings(mut self, strict: bool) -> Self {
        self.fail_on_warnings = strict;
        self
    }

    /// Sets the stage cache directory.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Sets the QA board directory.
    #[must_use]
    pub fn with_qa_board_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.qa_board_root = Some(root.into());
        self
    }

    /// Sets the versioned output directory.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    /// Total draft executions allowed per run.
    #[must_use]
    pub fn draft_budget(&self) -> u32 {
        self.max_auto_revisions.saturating_add(1)
    }

    /// The effective QA board directory.
    #[must_use]
    pub fn effective_qa_board_root(&self) -> Option<&PathBuf> {
        self.qa_board_root.as_ref().or(self.output_root.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_auto_revisions, 2);
        assert_eq!(config.draft_budget(), 3);
        assert!(!config.fail_on_warnings);
        assert!(config.cache_root.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_MAX_AUTO_REVISIONS, "4"),
            (ENV_FAIL_ON_WARN, "1"),
            (ENV_CACHE_DIR, "/tmp/cache"),
            (ENV_OUTPUT_DIR, "/tmp/out"),
        ]));

        assert_eq!(config.max_auto_revisions, 4);
        assert!(config.fail_on_warnings);
        assert_eq!(config.cache_root, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(config.effective_qa_board_root(), Some(&PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_malformed_number_falls_back() {
        let config = EngineConfig::from_lookup(lookup(&[(ENV_MAX_AUTO_REVISIONS, "many")]));
        assert_eq!(config.max_auto_revisions, 2);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[(ENV_CACHE_DIR, "  "), (ENV_FAIL_ON_WARN, "0")]));
        assert!(config.cache_root.is_none());
        assert!(!config.fail_on_warnings);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"fail_on_warnings": true}"#).unwrap();
        assert_eq!(config.max_auto_revisions, 2);
        assert!(config.fail_on_warnings);
    }
}
