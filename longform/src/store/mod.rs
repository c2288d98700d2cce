//! Artifact stores.
//!
//! A store maps each stage to its latest validated result. Saving a stage
//! twice overwrites the earlier artifact.

mod cached;

pub use cached::CachedArtifactStore;

use crate::core::{ArtifactMap, StageId, StageResult};
use parking_lot::RwLock;
use std::fmt::Debug;

/// Keyed storage for stage artifacts.
pub trait ArtifactStore: Send + Sync + Debug {
    /// Stores a result, replacing any previous one.
    fn save(&self, stage: StageId, result: StageResult);

    /// Returns the result for a stage.
    fn get(&self, stage: StageId) -> Option<StageResult>;

    /// Returns a copy of every stored artifact.
    fn dump(&self) -> ArtifactMap;

    /// Returns true if the stage has an artifact.
    fn contains(&self, stage: StageId) -> bool {
        self.get(stage).is_some()
    }
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<ArtifactMap>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with artifacts.
    #[must_use]
    pub fn with_initial(initial: ArtifactMap) -> Self {
        Self {
            artifacts: RwLock::new(initial),
        }
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, stage: StageId, result: StageResult) {
        self.artifacts.write().insert(stage, result);
    }

    fn get(&self, stage: StageId) -> Option<StageResult> {
        self.artifacts.read().get(&stage).cloned()
    }

    fn dump(&self) -> ArtifactMap {
        self.artifacts.read().clone()
    }

    fn contains(&self, stage: StageId) -> bool {
        self.artifacts.read().contains_key(&stage)
    }
}
