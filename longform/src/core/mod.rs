//! Core domain model types for the longform workflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identifiers and the canonical order
//! - Stage events and derived stage states
//! - Opaque stage results
//! - Workflow request and result

mod event;
mod request;
mod result;
mod stage;
mod state;

pub use event::{EventStatus, StageEvent};
pub use request::{
    RevisionContext, RevisionDirective, WorkflowRequest, WorkflowResult, WorkflowTelemetry,
};
pub use result::{ArtifactMap, StageResult};
pub use stage::{StageId, UnknownStageError, STAGE_SEQUENCE};
pub use state::{StageRunStatus, StageState};
