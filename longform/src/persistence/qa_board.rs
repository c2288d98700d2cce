//! QA board: a JSON array of run summaries shared by every run.
//!
//! Concurrent appends, from tasks or from other processes, are serialized
//! by an exclusive advisory lock on `qa-board.json.lock`. The board itself
//! is replaced atomically through a temporary file.

use crate::core::{ArtifactMap, EventStatus, StageEvent, StageId};
use crate::errors::QaBoardError;
use crate::revision::ReviewVerdict;
use crate::utils::Timestamp;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the board inside its root directory.
pub const BOARD_FILENAME: &str = "qa-board.json";
const LOCK_FILENAME: &str = "qa-board.json.lock";
const TEMP_FILENAME: &str = "qa-board.json.tmp";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every stage completed.
    Completed,
    /// The run stopped with a terminal error.
    Failed,
}

/// One run summary on the QA board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaBoardEntry {
    /// Trace id of the run.
    pub trace_id: String,
    /// When the run context was created.
    pub created_at: Timestamp,
    /// How the run ended.
    pub outcome: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Stage of the last error event, for failed runs.
    pub failed_stage: Option<StageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Terminal error text, for failed runs.
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// `projectId` from the init artifact.
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// `titleCandidates` from the init artifact.
    pub title_candidates: Vec<String>,
    /// Successful draft executions.
    pub draft_attempts: u32,
    /// Review executions.
    pub review_attempts: u32,
    /// Draft executions beyond the first.
    pub auto_revision_rounds: u32,
    /// Blocking issues in the last review.
    pub review_must_fix: usize,
    /// Warnings in the last review.
    pub review_warnings: usize,
    #[serde(default)]
    /// Blocking issue texts.
    pub review_must_fix_detail: Vec<String>,
    #[serde(default)]
    /// Warning texts.
    pub review_warnings_detail: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// The evaluation artifact, if the run got that far.
    pub evaluation: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// `finalDraft.totalWordCount` from the polish artifact.
    pub total_word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Number of `finalDraft.chapters` in the polish artifact.
    pub chapter_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Where the polished markdown was written.
    pub markdown_path: Option<String>,
}

impl QaBoardEntry {
    /// Summarizes a finished run from its artifacts and event log.
    ///
    /// `failure` is the failed stage and its error message, if the run
    /// failed.
    #[must_use]
    pub fn summarize(
        trace_id: &str,
        created_at: Timestamp,
        artifacts: &ArtifactMap,
        events: &[StageEvent],
        failure: Option<(StageId, String)>,
    ) -> Self {
        let count = |stage: StageId, status: EventStatus| {
            let n = events
                .iter()
                .filter(|e| e.stage == stage && e.status == status)
                .count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let draft_attempts = count(StageId::Draft, EventStatus::Success);

        let verdict = artifacts
            .get(&StageId::Review)
            .and_then(|review| review.decode::<ReviewVerdict>().ok())
            .unwrap_or_default();

        let init = artifacts.get(&StageId::Init).map(|r| r.as_value());
        let project_id = init
            .and_then(|v| v.get("projectId"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let title_candidates = init
            .and_then(|v| v.get("titleCandidates"))
            .and_then(|v| v.as_array())
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let polish = artifacts.get(&StageId::Polish).map(|r| r.as_value());
        let final_draft = polish.and_then(|v| v.get("finalDraft"));

        let (outcome, failed_stage, error_message) = match failure {
            Some((stage, message)) => (RunOutcome::Failed, Some(stage), Some(message)),
            None => (RunOutcome::Completed, None, None),
        };

        Self {
            trace_id: trace_id.to_string(),
            created_at,
            outcome,
            failed_stage,
            error_message,
            project_id,
            title_candidates,
            draft_attempts,
            review_attempts: count(StageId::Review, EventStatus::Start),
            auto_revision_rounds: draft_attempts.saturating_sub(1),
            review_must_fix: verdict.must_fix.len(),
            review_warnings: verdict.warnings.len(),
            review_must_fix_detail: verdict.must_fix,
            review_warnings_detail: verdict.warnings,
            evaluation: artifacts
                .get(&StageId::Evaluate)
                .map(|r| r.as_value().clone()),
            total_word_count: final_draft
                .and_then(|d| d.get("totalWordCount"))
                .and_then(serde_json::Value::as_u64),
            chapter_count: final_draft
                .and_then(|d| d.get("chapters"))
                .and_then(|c| c.as_array())
                .map(Vec::len),
            markdown_path: polish
                .and_then(|v| v.get("markdownPath"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// Appends an entry to `<root>/qa-board.json`, keeping entries sorted newest
/// first. Returns the board path.
pub async fn append_entry(root: &Path, entry: QaBoardEntry) -> Result<PathBuf, QaBoardError> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || append_entry_blocking(&root, entry))
        .await
        .map_err(|e| QaBoardError::Task(e.to_string()))?
}

/// Reads the board. A missing file is an empty board.
pub fn read_board(root: &Path) -> Result<Vec<QaBoardEntry>, QaBoardError> {
    let path = root.join(BOARD_FILENAME);
    match fs::read(&path) {
        Ok(raw) => Ok(serde_json::from_slice(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(QaBoardError::Io { path, source }),
    }
}

fn append_entry_blocking(root: &Path, entry: QaBoardEntry) -> Result<PathBuf, QaBoardError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| QaBoardError::Io { path, source }
    };

    fs::create_dir_all(root).map_err(io_err(root))?;

    let lock_path = root.join(LOCK_FILENAME);
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(io_err(&lock_path))?;
    FileExt::lock_exclusive(&lock).map_err(io_err(&lock_path))?;

    let result = rewrite_board(root, entry);

    if let Err(e) = FileExt::unlock(&lock) {
        warn!(path = %lock_path.display(), error = %e, "Failed to release QA board lock");
    }
    result
}

fn rewrite_board(root: &Path, entry: QaBoardEntry) -> Result<PathBuf, QaBoardError> {
    let path = root.join(BOARD_FILENAME);
    let mut entries = read_board(root).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "QA board unreadable, starting a new one");
        Vec::new()
    });

    entries.push(entry);
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let body = serde_json::to_vec_pretty(&entries)?;
    let temp = root.join(TEMP_FILENAME);
    write_file(&temp, &body)?;
    fs::rename(&temp, &path).map_err(|source| QaBoardError::Io {
        path: path.clone(),
        source,
    })?;

    debug!(path = %path.display(), entries = entries.len(), "Appended QA board entry");
    Ok(path)
}

fn write_file(path: &Path, body: &[u8]) -> Result<(), QaBoardError> {
    use std::io::Write;

    let to_err = |source: std::io::Error| QaBoardError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(to_err)?;
    file.write_all(body).map_err(to_err)?;
    file.sync_all().map_err(to_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageResult;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn entry(trace_id: &str, minute: u32) -> QaBoardEntry {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap();
        QaBoardEntry::summarize(trace_id, created_at, &ArtifactMap::new(), &[], None)
    }

    #[tokio::test]
    async fn test_append_sorts_newest_first() {
        let dir = tempdir().unwrap();
        append_entry(dir.path(), entry("old", 1)).await.unwrap();
        append_entry(dir.path(), entry("new", 30)).await.unwrap();
        let path = append_entry(dir.path(), entry("mid", 10)).await.unwrap();

        assert!(path.ends_with(BOARD_FILENAME));
        let traces: Vec<_> = read_board(dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.trace_id)
            .collect();
        assert_eq!(traces, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = tempdir().unwrap();
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let root = dir.path().to_path_buf();
                tokio::spawn(async move { append_entry(&root, entry(&format!("t{i}"), i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(read_board(dir.path()).unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_corrupt_board_is_replaced() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(BOARD_FILENAME), "not json").unwrap();

        append_entry(dir.path(), entry("fresh", 0)).await.unwrap();
        assert_eq!(read_board(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_summarize_counts_attempts_and_verdict() {
        let now = Utc::now();
        let mut artifacts = ArtifactMap::new();
        artifacts.insert(
            StageId::Init,
            StageResult::new(serde_json::json!({
                "projectId": "p-7",
                "titleCandidates": ["The Glass Key", "Room 9"]
            })),
        );
        artifacts.insert(
            StageId::Review,
            StageResult::new(serde_json::json!({
                "mustFix": ["alibi contradicts timeline"],
                "warnings": []
            })),
        );
        let events = vec![
            StageEvent::start(StageId::Draft),
            StageEvent::success(StageId::Draft),
            StageEvent::start(StageId::Review),
            StageEvent::error(StageId::Review, "blocked"),
            StageEvent::start(StageId::Draft),
            StageEvent::success(StageId::Draft),
            StageEvent::start(StageId::Review).at(now + Duration::seconds(1)),
        ];

        let summary = QaBoardEntry::summarize(
            "t",
            now,
            &artifacts,
            &events,
            Some((StageId::Review, "blocked".into())),
        );

        assert_eq!(summary.outcome, RunOutcome::Failed);
        assert_eq!(summary.failed_stage, Some(StageId::Review));
        assert_eq!(summary.project_id.as_deref(), Some("p-7"));
        assert_eq!(summary.title_candidates.len(), 2);
        assert_eq!(summary.draft_attempts, 2);
        assert_eq!(summary.review_attempts, 2);
        assert_eq!(summary.auto_revision_rounds, 1);
        assert_eq!(summary.review_must_fix, 1);
        assert_eq!(summary.review_warnings, 0);
        assert!(summary.evaluation.is_none());
    }

    #[test]
    fn test_summarize_reads_polish_metrics() {
        let mut artifacts = ArtifactMap::new();
        artifacts.insert(
            StageId::Polish,
            StageResult::new(serde_json::json!({
                "finalDraft": {
                    "totalWordCount": 5400,
                    "chapters": [{"title": "One"}, {"title": "Two"}, {"title": "Three"}]
                },
                "markdownPath": "20240501/t_polish_v01.md"
            })),
        );

        let summary = QaBoardEntry::summarize("t", Utc::now(), &artifacts, &[], None);
        assert_eq!(summary.total_word_count, Some(5400));
        assert_eq!(summary.chapter_count, Some(3));
        assert_eq!(summary.markdown_path.as_deref(), Some("20240501/t_polish_v01.md"));

        let bare = QaBoardEntry::summarize("t", Utc::now(), &ArtifactMap::new(), &[], None);
        assert_eq!(bare.total_word_count, None);
        assert_eq!(bare.chapter_count, None);
        assert!(serde_json::to_value(&bare).unwrap().get("markdownPath").is_none());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(entry("t", 0)).unwrap();
        assert_eq!(json["traceId"], "t");
        assert_eq!(json["outcome"], "completed");
        assert!(json.get("failedStage").is_none());
    }
}
