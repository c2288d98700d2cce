//! Run telemetry derived from the event log.

use crate::core::{EventStatus, StageEvent, StageId, StageRunStatus, StageState};

/// Derives one [`StageState`] per stage of `sequence` from `events`.
///
/// Pure: the result depends only on the events, so it can be called at any
/// point during or after a run and two calls over the same log agree.
///
/// - `attempts` is `max(#start, #success + #error)`
/// - `status` follows the stage's last event; no events means pending
/// - `started_at` is the first `start`
/// - `finished_at` is the last `error` if the stage ever failed, otherwise
///   the last `success`
/// - `error_message` is set only for failed stages
#[must_use]
pub fn derive_stage_states(events: &[StageEvent], sequence: &[StageId]) -> Vec<StageState> {
    sequence
        .iter()
        .map(|&stage| derive_one(events, stage))
        .collect()
}

fn derive_one(events: &[StageEvent], stage: StageId) -> StageState {
    let stage_events: Vec<&StageEvent> = events.iter().filter(|e| e.stage == stage).collect();
    let Some(last) = stage_events.last() else {
        return StageState::pending(stage);
    };

    let of = |status: EventStatus| stage_events.iter().filter(move |e| e.status == status);
    let starts = of(EventStatus::Start).count();
    let successes = of(EventStatus::Success).count();
    let last_error = of(EventStatus::Error).last();
    let errors = of(EventStatus::Error).count();

    let status = match last.status {
        EventStatus::Error => StageRunStatus::Failed,
        EventStatus::Success => StageRunStatus::Completed,
        EventStatus::Start => StageRunStatus::Running,
    };

    let finished_at = last_error
        .or_else(|| of(EventStatus::Success).last())
        .map(|e| e.timestamp);

    let error_message = if status == StageRunStatus::Failed {
        last_error.and_then(|e| e.message.clone())
    } else {
        None
    };

    StageState {
        stage,
        status,
        attempts: u32::try_from(starts.max(successes + errors)).unwrap_or(u32::MAX),
        started_at: of(EventStatus::Start).next().map(|e| e.timestamp),
        finished_at,
        error_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::STAGE_SEQUENCE;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(seconds: i64) -> crate::utils::Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_no_events_is_pending() {
        let states = derive_stage_states(&[], &STAGE_SEQUENCE);
        assert_eq!(states.len(), 10);
        assert!(states.iter().all(|s| s.status == StageRunStatus::Pending && s.attempts == 0));
    }

    #[test]
    fn test_retry_then_success() {
        let events = vec![
            StageEvent::start(StageId::Init).at(at(0)),
            StageEvent::error(StageId::Init, "timeout").at(at(1)),
            StageEvent::start(StageId::Init).at(at(2)),
            StageEvent::success(StageId::Init).at(at(3)),
        ];
        let state = &derive_stage_states(&events, &[StageId::Init])[0];

        assert_eq!(state.status, StageRunStatus::Completed);
        assert_eq!(state.attempts, 2);
        assert_eq!(state.started_at, Some(at(0)));
        assert_eq!(state.finished_at, Some(at(1)));
        assert_eq!(state.error_message, None);
    }

    #[test]
    fn test_failed_and_running() {
        let events = vec![
            StageEvent::start(StageId::Review).at(at(0)),
            StageEvent::error(StageId::Review, "Review blocked: gap").at(at(1)),
            StageEvent::start(StageId::Polish).at(at(2)),
        ];
        let states = derive_stage_states(&events, &[StageId::Review, StageId::Polish]);

        assert_eq!(states[0].status, StageRunStatus::Failed);
        assert_eq!(states[0].error_message.as_deref(), Some("Review blocked: gap"));
        assert_eq!(states[1].status, StageRunStatus::Running);
        assert_eq!(states[1].attempts, 1);
        assert_eq!(states[1].finished_at, None);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let events = vec![
            StageEvent::start(StageId::Draft).at(at(0)),
            StageEvent::success(StageId::Draft).at(at(1)),
            StageEvent::start(StageId::Review).at(at(2)),
            StageEvent::error(StageId::Review, "blocked").at(at(3)),
            StageEvent::start(StageId::Draft).at(at(4)),
            StageEvent::success(StageId::Draft).at(at(5)),
        ];
        assert_eq!(
            derive_stage_states(&events, &STAGE_SEQUENCE),
            derive_stage_states(&events, &STAGE_SEQUENCE)
        );
        assert_eq!(derive_stage_states(&events, &STAGE_SEQUENCE)[6].attempts, 2);
    }
}
