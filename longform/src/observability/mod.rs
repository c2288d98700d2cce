//! Observability: telemetry derivation, run summaries and log setup.

mod logging;
mod run_summary;
mod telemetry;

pub use logging::init_tracing;
pub use run_summary::{build_run_payload, log_run_summary};
pub use telemetry::derive_stage_states;
