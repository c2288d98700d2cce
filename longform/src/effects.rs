//! Detached side effects and their diagnostics.
//!
//! Cache write-through and QA board appends must never block or fail a run.
//! They run as detached tokio tasks registered here; failures are captured
//! in a diagnostics log instead of being dropped, and tests or shutdown code
//! can wait for outstanding tasks with [`SideEffects::flush`].

use crate::utils::{now_utc, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Kind of side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    /// Persistent stage cache write.
    CacheWrite,
    /// QA board append.
    QaBoard,
    /// Versioned output artifact write.
    VersionedOutput,
}

/// A recorded side-effect failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideEffectFailure {
    /// What failed.
    pub kind: SideEffectKind,
    /// Short description, usually `<trace_id>/<stage>`.
    pub label: String,
    /// Error text.
    pub error: String,
    /// When the failure was recorded.
    pub at: Timestamp,
}

#[derive(Default)]
struct Inner {
    pending: Mutex<Vec<JoinHandle<()>>>,
    failures: RwLock<Vec<SideEffectFailure>>,
}

/// Tracks detached side-effect tasks. Cheap to clone.
#[derive(Clone, Default)]
pub struct SideEffects {
    inner: Arc<Inner>,
}

impl SideEffects {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a detached task. Its error, if any, is recorded rather than
    /// propagated.
    ///
    /// Outside a tokio runtime the effect cannot run; that is recorded as a
    /// failure too.
    pub fn spawn<F, E>(&self, kind: SideEffectKind, label: impl Into<String>, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let label = label.into();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.record(kind, label, "no tokio runtime available");
            return;
        };

        let tracker = self.clone();
        let task = handle.spawn(async move {
            match fut.await {
                Ok(()) => debug!(?kind, label = %label, "Side effect completed"),
                Err(e) => tracker.record(kind, label, e.to_string()),
            }
        });

        let mut pending = self.inner.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(task);
    }

    /// Records a failure that happened inline.
    pub fn record(&self, kind: SideEffectKind, label: impl Into<String>, error: impl Into<String>) {
        let failure = SideEffectFailure {
            kind,
            label: label.into(),
            error: error.into(),
            at: now_utc(),
        };
        warn!(kind = ?failure.kind, label = %failure.label, error = %failure.error, "Side effect failed");
        self.inner.failures.write().push(failure);
    }

    /// Waits for every task spawned so far.
    pub async fn flush(&self) {
        let handles: Vec<_> = self.inner.pending.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Side effect task did not finish: {}", e);
            }
        }
    }

    /// Number of tasks not yet observed as finished.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .pending
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// All recorded failures.
    #[must_use]
    pub fn failures(&self) -> Vec<SideEffectFailure> {
        self.inner.failures.read().clone()
    }
}

impl std::fmt::Debug for SideEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffects")
            .field("pending", &self.inner.pending.lock().len())
            .field("failures", &self.inner.failures.read().len())
            .finish()
    }
}
