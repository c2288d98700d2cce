//! Filesystem sinks: stage cache, QA board and versioned outputs.
//!
//! Everything here is best-effort from the engine's point of view; callers
//! route failures into [`SideEffects`](crate::effects::SideEffects).

mod qa_board;
mod stage_cache;
mod versioned;

pub use qa_board::{append_entry, read_board, QaBoardEntry, RunOutcome, BOARD_FILENAME};
pub use stage_cache::{CacheEntry, StageCache};
pub use versioned::{persist_versioned_output, VersionedOutput};
