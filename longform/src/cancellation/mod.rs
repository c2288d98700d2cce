//! Cooperative cancellation for long-running workflow runs.

mod token;

pub use token::{CancelCallback, CancellationToken};
