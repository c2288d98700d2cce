//! Append-only event log with synchronous fan-out.

use crate::core::StageEvent;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

use super::EventSink;

/// A listener invoked for every emitted event.
pub type EventListener = Arc<dyn Fn(&StageEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, EventListener)>>,
}

impl Listeners {
    fn remove(&self, id: u64) {
        self.entries.write().retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Ordered log of stage events.
///
/// `emit` appends and then calls each subscribed listener in subscription
/// order. The listener list is snapshotted before dispatch, so subscribing
/// or unsubscribing from inside a listener only affects later emissions. A
/// panicking listener is logged and skipped.
pub struct EventBus {
    events: RwLock<Vec<StageEvent>>,
    listeners: Arc<Listeners>,
    record: bool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus that records its history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            listeners: Arc::new(Listeners::default()),
            record: true,
        }
    }

    /// Creates a bus that only fans out and keeps no history.
    ///
    /// The engine uses one of these to carry `on_event` registrations across
    /// invocations while each run records into its own bus.
    #[must_use]
    pub fn broadcast_only() -> Self {
        Self {
            record: false,
            ..Self::new()
        }
    }

    /// Appends an event and notifies listeners.
    pub fn emit(&self, event: StageEvent) {
        if self.record {
            self.events.write().push(event.clone());
        }
        self.dispatch(&event);
    }

    fn dispatch(&self, event: &StageEvent) {
        let snapshot: Vec<EventListener> = self
            .listeners
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(event);
            })) {
                warn!(stage = %event.stage, status = %event.status, "Event listener panicked: {:?}", e);
            }
        }
    }

    /// Registers a listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(listener))
    }

    /// Registers an already shared listener.
    pub fn subscribe_arc(&self, listener: EventListener) -> Subscription {
        let id = self.listeners.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.entries.write().push((id, listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
            active: AtomicBool::new(true),
        }
    }

    /// Registers an [`EventSink`].
    pub fn subscribe_sink(&self, sink: Arc<dyn EventSink>) -> Subscription {
        self.subscribe(move |event| sink.on_event(event))
    }

    /// Returns the full event history in emission order.
    #[must_use]
    pub fn list(&self) -> Vec<StageEvent> {
        self.events.read().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Number of currently subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.entries.read().len()
    }

    /// Removes every listener.
    pub fn clear_listeners(&self) {
        self.listeners.entries.write().clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.len())
            .field("listeners", &self.listener_count())
            .field("record", &self.record)
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it. Unsubscribing twice is a
/// no-op.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
    active: AtomicBool,
}

impl Subscription {
    /// Removes the listener from its bus.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(listeners) = self.listeners.upgrade() {
                listeners.remove(self.id);
            }
        }
    }

    /// Returns true until `unsubscribe` has been called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.read().len())
            .finish()
    }
}
