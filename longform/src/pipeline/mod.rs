//! Workflow execution.
//!
//! This module provides:
//! - The per-run context and the runtime handed to executors
//! - The retry wrapper around a single stage
//! - The engine that walks the stage sequence and its builder

mod builder;
mod context;
mod engine;
mod node;


pub use builder::WorkflowEngineBuilder;
pub use context::{StageRuntime, WorkflowContext};
pub use engine::WorkflowEngine;
