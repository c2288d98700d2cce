//! Versioned output artifacts.
//!
//! Unlike stage artifacts, which are overwritten, these files accumulate:
//! `<root>/<YYYYMMDD>/<trace_id>_<label>_v<NN>_<timestamp>.md`.

use crate::errors::QaBoardError;
use crate::utils::{date_stamp, file_safe_timestamp, now_utc, Timestamp};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a versioned artifact was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedOutput {
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    /// Path relative to the output root.
    pub relative_path: PathBuf,
    /// Version number used in the file name.
    pub version: u32,
}

/// Writes `content` as a new version of `label` for `trace_id`.
///
/// The date directory comes from `created_at`. The version is `attempt` when
/// given and positive, otherwise one past the highest version already in
/// the directory.
pub async fn persist_versioned_output(
    root: &Path,
    trace_id: &str,
    label: &str,
    content: &str,
    created_at: Timestamp,
    attempt: Option<u32>,
) -> Result<VersionedOutput, QaBoardError> {
    let date_dir = date_stamp(&created_at);
    let dir = root.join(&date_dir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| QaBoardError::Io {
            path: dir.clone(),
            source,
        })?;

    let prefix = format!("{trace_id}_{label}_v");
    let version = match attempt {
        Some(n) if n > 0 => n,
        _ => next_version(&dir, &prefix).await,
    };

    let file_name = format!("{prefix}{version:02}_{}.md", file_safe_timestamp(&now_utc()));
    let path = dir.join(&file_name);
    tokio::fs::write(&path, content)
        .await
        .map_err(|source| QaBoardError::Io {
            path: path.clone(),
            source,
        })?;

    debug!(trace_id, label, version, path = %path.display(), "Wrote versioned output");
    Ok(VersionedOutput {
        path,
        relative_path: Path::new(&date_dir).join(file_name),
        version,
    })
}

async fn next_version(dir: &Path, prefix: &str) -> u32 {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 1;
    };

    let mut highest = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(rest) = name.to_str().and_then(|n| n.strip_prefix(prefix)) else {
            continue;
        };
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(n) = digits.parse::<u32>() {
            highest = highest.max(n);
        }
    }
    highest + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn created() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_versions_increment() {
        let dir = tempdir().unwrap();
        let first = persist_versioned_output(dir.path(), "t1", "polish", "a", created(), None)
            .await
            .unwrap();
        let second = persist_versioned_output(dir.path(), "t1", "polish", "b", created(), None)
            .await
            .unwrap();
        let other = persist_versioned_output(dir.path(), "t2", "polish", "c", created(), None)
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(other.version, 1);
        assert!(first.relative_path.starts_with("20240309"));
        let name = second.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("t1_polish_v02_"), "{name}");
        assert!(name.ends_with(".md"));
        assert_eq!(std::fs::read_to_string(&second.path).unwrap(), "b");
    }

    #[tokio::test]
    async fn test_explicit_attempt_wins() {
        let dir = tempdir().unwrap();
        let out = persist_versioned_output(dir.path(), "t1", "draft", "x", created(), Some(3))
            .await
            .unwrap();
        assert_eq!(out.version, 3);

        let next = persist_versioned_output(dir.path(), "t1", "draft", "y", created(), Some(0))
            .await
            .unwrap();
        assert_eq!(next.version, 4);
    }
}
