//! Wide run-summary event logged once per run.

use crate::core::{StageRunStatus, StageState};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Builds the summary payload for a finished run.
#[must_use]
pub fn build_run_payload(
    trace_id: &str,
    stages: &[StageState],
    failed_stage: Option<&str>,
) -> serde_json::Value {
    let mut stage_counts: BTreeMap<String, u32> = BTreeMap::new();
    for state in stages {
        *stage_counts.entry(state.status.to_string()).or_insert(0) += 1;
    }
    let total_attempts: u32 = stages.iter().map(|s| s.attempts).sum();

    serde_json::json!({
        "trace_id": trace_id,
        "status": if failed_stage.is_some() { "failed" } else { "completed" },
        "failed_stage": failed_stage,
        "stage_counts": stage_counts,
        "total_attempts": total_attempts,
        "completed": stages.iter().filter(|s| s.status == StageRunStatus::Completed).count(),
    })
}

/// Logs the run summary: `info` on success, `warn` on failure.
pub fn log_run_summary(trace_id: &str, stages: &[StageState], failed_stage: Option<&str>) {
    let payload = build_run_payload(trace_id, stages, failed_stage);
    if failed_stage.is_some() {
        warn!(trace_id, summary = %payload, "Workflow run failed");
    } else {
        info!(trace_id, summary = %payload, "Workflow run completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;

    #[test]
    fn test_payload_counts_statuses() {
        let mut done = StageState::pending(StageId::Init);
        done.status = StageRunStatus::Completed;
        done.attempts = 2;
        let mut failed = StageState::pending(StageId::Blueprint);
        failed.status = StageRunStatus::Failed;
        failed.attempts = 1;
        let pending = StageState::pending(StageId::Cast);

        let payload = build_run_payload("t", &[done, failed, pending], Some("blueprint"));

        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["failed_stage"], "blueprint");
        assert_eq!(payload["stage_counts"]["completed"], 1);
        assert_eq!(payload["stage_counts"]["pending"], 1);
        assert_eq!(payload["total_attempts"], 3);
    }
}
