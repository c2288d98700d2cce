//! Executor registry keyed by stage.

use super::{SeedAware, StageExecutor};
use crate::core::StageId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps each stage to its executor.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    executors: BTreeMap<StageId, Arc<dyn StageExecutor>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor, replacing any previous one for the stage.
    pub fn register(&mut self, stage: StageId, executor: Arc<dyn StageExecutor>) {
        self.executors.insert(stage, executor);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, stage: StageId, executor: Arc<dyn StageExecutor>) -> Self {
        self.register(stage, executor);
        self
    }

    /// Merges another registry; its entries win.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.executors.extend(other.executors);
        self
    }

    /// Returns the executor for a stage.
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<Arc<dyn StageExecutor>> {
        self.executors.get(&stage).cloned()
    }

    /// Returns true if the stage has an executor.
    #[must_use]
    pub fn contains(&self, stage: StageId) -> bool {
        self.executors.contains_key(&stage)
    }

    /// Stages of `sequence` without an executor.
    #[must_use]
    pub fn missing(&self, sequence: &[StageId]) -> Vec<StageId> {
        sequence
            .iter()
            .copied()
            .filter(|stage| !self.contains(*stage))
            .collect()
    }

    /// Wraps every executor in [`SeedAware`].
    #[must_use]
    pub fn seed_aware(self) -> Self {
        let executors = self
            .executors
            .into_iter()
            .map(|(stage, inner)| {
                let wrapped: Arc<dyn StageExecutor> = Arc::new(SeedAware::new(stage, inner));
                (stage, wrapped)
            })
            .collect();
        Self { executors }
    }

    /// Number of registered executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
