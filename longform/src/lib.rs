//! # Longform
//!
//! Orchestration engine for a ten-stage story generation workflow.
//!
//! The engine runs a fixed line of stages, from `init` to `evaluate`, with
//! support for:
//!
//! - **Dependency enforcement**: a stage never runs before its inputs exist
//! - **Bounded retries**: transient executor failures are retried per stage
//! - **Revision loop**: a blocking review sends the run back to `draft`
//!   under a separate budget
//! - **Event-sourced telemetry**: stage states are derived from the event log
//! - **Resumption**: artifacts are written through to a stage cache keyed by
//!   trace id, and a failed run can be resumed from it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use longform::prelude::*;
//!
//! let engine = WorkflowEngine::builder()
//!     .registry(my_executors())
//!     .llm(Arc::new(MyModel::new()))
//!     .config(EngineConfig::from_env())
//!     .build()?;
//!
//! match engine.invoke(WorkflowRequest::new("a locked-room mystery")).await {
//!     Ok(result) => println!("finished {}", result.trace_id),
//!     Err(err) => {
//!         // Resume later with the same trace id.
//!         let retry = err.resume_request("a locked-room mystery");
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod contracts;
pub mod core;
pub mod effects;
pub mod errors;
pub mod events;
pub mod llm;
pub mod observability;
pub mod persistence;
pub mod pipeline;
pub mod revision;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::EngineConfig;
    pub use crate::contracts::{extract_json, invoke_and_parse, parse_typed};
    pub use crate::core::{
        ArtifactMap, StageEvent, StageId, StageResult, StageRunStatus, StageState,
        WorkflowRequest, WorkflowResult, STAGE_SEQUENCE,
    };
    pub use crate::errors::{StageError, StageExecutionError, WorkflowError};
    pub use crate::events::{EventBus, EventSink, LoggingEventSink, Subscription};
    pub use crate::llm::{LlmExecutor, LlmMode, Prompt};
    pub use crate::observability::{derive_stage_states, init_tracing};
    pub use crate::pipeline::{StageRuntime, WorkflowEngine, WorkflowEngineBuilder};
    pub use crate::revision::ReviewVerdict;
    pub use crate::stages::{FnExecutor, SeedAware, StageConfig, StageExecutor, StageRegistry};
    pub use crate::store::{ArtifactStore, MemoryArtifactStore};
    pub use crate::utils::{generate_trace_id, Timestamp};
}
