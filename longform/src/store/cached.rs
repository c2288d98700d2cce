//! Write-through store backed by the persistent stage cache.

use super::{ArtifactStore, MemoryArtifactStore};
use crate::core::{ArtifactMap, StageId, StageResult};
use crate::effects::{SideEffectKind, SideEffects};
use crate::persistence::StageCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Write ordering for one stage's cache file.
///
/// Writes hold `lock` for their whole duration. A write whose generation is
/// no longer `latest` once it holds the lock is dropped, so the newest save
/// is always the last one to land.
#[derive(Debug, Default)]
struct WriteSlot {
    latest: AtomicU64,
    lock: tokio::sync::Mutex<()>,
}

/// In-memory store that mirrors every save into a [`StageCache`].
///
/// The cache write runs as a detached side effect; `save` returns as soon
/// as the in-memory copy is updated. Repeated saves of a stage leave the
/// cache holding the last one.
#[derive(Debug)]
pub struct CachedArtifactStore {
    memory: MemoryArtifactStore,
    cache: StageCache,
    trace_id: String,
    effects: SideEffects,
    slots: Mutex<HashMap<StageId, Arc<WriteSlot>>>,
}

impl CachedArtifactStore {
    /// Creates a store for one run.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        cache: StageCache,
        initial: ArtifactMap,
        effects: SideEffects,
    ) -> Self {
        Self {
            memory: MemoryArtifactStore::with_initial(initial),
            cache,
            trace_id: trace_id.into(),
            effects,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, stage: StageId) -> Arc<WriteSlot> {
        Arc::clone(self.slots.lock().entry(stage).or_default())
    }

    /// The backing cache.
    #[must_use]
    pub fn cache(&self) -> &StageCache {
        &self.cache
    }
}

impl ArtifactStore for CachedArtifactStore {
    fn save(&self, stage: StageId, result: StageResult) {
        self.memory.save(stage, result.clone());

        let slot = self.slot(stage);
        let generation = slot.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let cache = self.cache.clone();
        let trace_id = self.trace_id.clone();
        self.effects.spawn(
            SideEffectKind::CacheWrite,
            format!("{}/{}", self.trace_id, stage),
            async move {
                let _guard = slot.lock.lock().await;
                if slot.latest.load(Ordering::SeqCst) != generation {
                    debug!(trace_id = %trace_id, stage = %stage, generation, "Skipping superseded cache write");
                    return Ok(());
                }
                cache.write(&trace_id, stage, &result).await.map(|_| ())
            },
        );
    }

    fn get(&self, stage: StageId) -> Option<StageResult> {
        self.memory.get(stage)
    }

    fn dump(&self) -> ArtifactMap {
        self.memory.dump()
    }

    fn contains(&self, stage: StageId) -> bool {
        self.memory.contains(stage)
    }
}
