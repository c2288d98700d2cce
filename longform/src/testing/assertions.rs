//! Assertions over run telemetry.

use crate::core::{EventStatus, StageEvent, StageId, StageRunStatus, StageState};

fn find(states: &[StageState], stage: StageId) -> &StageState {
    states
        .iter()
        .find(|s| s.stage == stage)
        .unwrap_or_else(|| panic!("no state for stage {stage}"))
}

/// Asserts the derived status of a stage.
pub fn assert_stage_status(states: &[StageState], stage: StageId, expected: StageRunStatus) {
    let actual = find(states, stage).status;
    assert_eq!(
        actual, expected,
        "Expected {stage} to be {expected}, got {actual}"
    );
}

/// Asserts the derived attempt count of a stage.
pub fn assert_attempts(states: &[StageState], stage: StageId, expected: u32) {
    let actual = find(states, stage).attempts;
    assert_eq!(
        actual, expected,
        "Expected {expected} attempts for {stage}, got {actual}"
    );
}

/// Asserts that no stage was left `running`.
pub fn assert_no_stage_running(states: &[StageState]) {
    let running: Vec<String> = states
        .iter()
        .filter(|s| s.status == StageRunStatus::Running)
        .map(|s| s.stage.to_string())
        .collect();
    assert!(running.is_empty(), "Stages left running: {running:?}");
}

/// Asserts that every `start` event is matched by exactly one terminal
/// event of the same stage before the next `start` of that stage.
pub fn assert_terminal_after_start(events: &[StageEvent]) {
    let mut open: Vec<StageId> = Vec::new();
    for event in events {
        match event.status {
            EventStatus::Start => {
                assert!(
                    !open.contains(&event.stage),
                    "{} started twice without a terminal event",
                    event.stage
                );
                open.push(event.stage);
            }
            EventStatus::Success | EventStatus::Error => {
                let before = open.len();
                open.retain(|s| *s != event.stage);
                assert_eq!(
                    before,
                    open.len() + 1,
                    "{} emitted {} without a start",
                    event.stage,
                    event.status
                );
            }
        }
    }
    assert!(open.is_empty(), "Stages without terminal event: {open:?}");
}
