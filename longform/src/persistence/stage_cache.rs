//! Filesystem-backed stage cache.
//!
//! One JSON file per `(trace_id, stage)` at `<root>/<trace_id>_<stage>.json`.
//! Runs with different trace ids never touch the same file. Entries are
//! written to a uniquely named temporary file and renamed into place, so a
//! reader never sees a partial entry.

use crate::core::{ArtifactMap, StageId, StageResult};
use crate::errors::CacheError;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A persisted stage artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Trace id of the run that produced the artifact.
    pub trace_id: String,
    /// The stage.
    pub stage: StageId,
    /// When the entry was written.
    pub timestamp: Timestamp,
    /// The artifact.
    pub data: StageResult,
}

/// Stage cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct StageCache {
    root: PathBuf,
}

impl StageCache {
    /// Creates a cache rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `(trace_id, stage)`.
    #[must_use]
    pub fn entry_path(&self, trace_id: &str, stage: StageId) -> PathBuf {
        self.root.join(format!("{trace_id}_{stage}.json"))
    }

    /// Writes one entry, atomically replacing any previous one.
    pub async fn write(
        &self,
        trace_id: &str,
        stage: StageId,
        payload: &StageResult,
    ) -> Result<PathBuf, CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CacheError::Io {
                path: self.root.clone(),
                source,
            })?;

        let path = self.entry_path(trace_id, stage);
        let entry = CacheEntry {
            trace_id: trace_id.to_string(),
            stage,
            timestamp: now_utc(),
            data: payload.clone(),
        };
        let body = serde_json::to_vec_pretty(&entry).map_err(|source| CacheError::Serialization {
            path: path.clone(),
            source,
        })?;

        let temp = self
            .root
            .join(format!(".{trace_id}_{stage}.{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(source) = tokio::fs::write(&temp, body).await {
            return Err(CacheError::Io { path: temp, source });
        }
        if let Err(source) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(CacheError::Io {
                path: path.clone(),
                source,
            });
        }

        debug!(trace_id, stage = %stage, path = %path.display(), "Wrote stage cache entry");
        Ok(path)
    }

    /// Reads one entry. Missing, corrupt or mismatched files yield `None`.
    pub async fn read(&self, trace_id: &str, stage: StageId) -> Option<StageResult> {
        let path = self.entry_path(trace_id, stage);
        match read_entry(&path).await {
            Ok(entry) if entry.trace_id == trace_id && entry.stage == stage => Some(entry.data),
            Ok(_) => {
                warn!(path = %path.display(), "Ignoring mismatched stage cache entry");
                None
            }
            Err(e) => {
                debug!(error = %e, "Stage cache entry unavailable");
                None
            }
        }
    }

    /// Reads every entry of a trace. Each file is validated independently;
    /// a corrupt file is skipped. An unreadable directory yields an empty
    /// map.
    pub async fn read_all(&self, trace_id: &str) -> ArtifactMap {
        let paths = match self.trace_files(trace_id).await {
            Ok(paths) => paths,
            Err(e) => {
                debug!(error = %e, "Stage cache directory unavailable");
                return ArtifactMap::new();
            }
        };

        let reads = paths.iter().map(|path| async move { (path, read_entry(path).await) });
        let mut artifacts = ArtifactMap::new();
        for (path, outcome) in futures::future::join_all(reads).await {
            match outcome {
                Ok(entry) if entry.trace_id == trace_id => {
                    artifacts.insert(entry.stage, entry.data);
                }
                Ok(_) => warn!(path = %path.display(), "Skipping stage cache entry for another trace"),
                Err(e) => warn!(error = %e, "Skipping corrupt stage cache entry"),
            }
        }
        artifacts
    }

    /// Removes every entry of a trace. Returns the number of files removed.
    pub async fn clear(&self, trace_id: &str) -> Result<usize, CacheError> {
        let paths = self.trace_files(trace_id).await?;
        let mut removed = 0;
        for path in paths {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|source| CacheError::Io {
                    path: path.clone(),
                    source,
                })?;
            removed += 1;
        }
        Ok(removed)
    }

    async fn trace_files(&self, trace_id: &str) -> Result<Vec<PathBuf>, CacheError> {
        let prefix = format!("{trace_id}_");
        let io_err = |source: std::io::Error| CacheError::Io {
            path: self.root.clone(),
            source,
        };

        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(io_err)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

async fn read_entry(path: &Path) -> Result<CacheEntry, CacheError> {
    let raw = tokio::fs::read(path).await.map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| CacheError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn payload(n: u32) -> StageResult {
        StageResult::new(serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path().join("cache"));

        let path = cache.write("trace-a", StageId::Clues, &payload(1)).await.unwrap();
        assert!(path.ends_with("trace-a_clues.json"));
        assert_eq!(cache.read("trace-a", StageId::Clues).await, Some(payload(1)));
        assert_eq!(cache.read("trace-a", StageId::Cast).await, None);
    }

    #[tokio::test]
    async fn test_read_all_skips_corrupt_and_foreign_entries() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path());

        cache.write("trace-a", StageId::Init, &payload(0)).await.unwrap();
        cache.write("trace-a", StageId::Blueprint, &payload(1)).await.unwrap();
        cache.write("trace-b", StageId::Init, &payload(9)).await.unwrap();
        std::fs::write(dir.path().join("trace-a_cast.json"), "{not json").unwrap();

        let all = cache.read_all("trace-a").await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[&StageId::Init], payload(0));
        assert_eq!(all[&StageId::Blueprint], payload(1));
    }

    #[tokio::test]
    async fn test_read_all_ignores_prefix_collisions() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path());

        cache.write("run_1", StageId::Init, &payload(1)).await.unwrap();
        cache.write("run", StageId::Init, &payload(2)).await.unwrap();

        let all = cache.read_all("run").await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[&StageId::Init], payload(2));
    }

    #[tokio::test]
    async fn test_read_all_missing_directory() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path().join("absent"));
        assert!(cache.read_all("trace").await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_only_trace_files() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path());
        cache.write("keep", StageId::Init, &payload(1)).await.unwrap();
        cache.write("drop", StageId::Init, &payload(1)).await.unwrap();
        cache.write("drop", StageId::Cast, &payload(1)).await.unwrap();

        assert_eq!(cache.clear("drop").await.unwrap(), 2);
        assert!(cache.read_all("drop").await.is_empty());
        assert_eq!(cache.read_all("keep").await.len(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_entry_without_leftovers() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path());
        cache.write("trace-a", StageId::Draft, &payload(1)).await.unwrap();
        cache.write("trace-a", StageId::Draft, &payload(2)).await.unwrap();

        assert_eq!(cache.read("trace-a", StageId::Draft).await, Some(payload(2)));
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_mismatched_entry_is_ignored() {
        let dir = tempdir().unwrap();
        let cache = StageCache::new(dir.path());
        cache.write("trace-a", StageId::Init, &payload(1)).await.unwrap();
        std::fs::copy(
            cache.entry_path("trace-a", StageId::Init),
            cache.entry_path("trace-a", StageId::Cast),
        )
        .unwrap();

        assert_eq!(cache.read("trace-a", StageId::Cast).await, None);
    }
}
