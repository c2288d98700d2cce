//! Testing utilities for longform workflows.
//!
//! This module provides:
//! - Mock stage executors and a queued stub LLM
//! - Review verdict, registry and runtime fixtures
//! - Assertions over derived stage states and the event log

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_attempts, assert_no_stage_running, assert_stage_status, assert_terminal_after_start,
};
pub use fixtures::{
    blocking_review, clean_review, runtime_with_llm, stub_registry, test_runtime, warning_review,
    TEST_TRACE_ID,
};
pub use mocks::{
    FailingExecutor, RecordingExecutor, ScriptedReviewExecutor, SlowExecutor, StubLlm,
};
