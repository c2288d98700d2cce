//! Event sink trait and implementations.

use crate::core::{EventStatus, StageEvent};
use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

/// Receives stage events from an [`EventBus`](super::EventBus).
///
/// Sinks are called synchronously on the emitting task and must not block.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &StageEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn on_event(&self, _event: &StageEvent) {}
}

/// A sink that logs events using the tracing framework.
///
/// Error events are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
    trace_id: Option<String>,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            trace_id: None,
        }
    }
}

impl LoggingEventSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self {
            level,
            trace_id: None,
        }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    /// Tags every log line with a trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

impl EventSink for LoggingEventSink {
    fn on_event(&self, event: &StageEvent) {
        let trace_id = self.trace_id.as_deref().unwrap_or("-");
        let attempt = event.attempt();
        if event.status == EventStatus::Error {
            warn!(
                trace_id,
                stage = %event.stage,
                attempt,
                error = event.message.as_deref().unwrap_or(""),
                "Stage {} error", event.stage
            );
            return;
        }
        if self.level == Level::DEBUG {
            debug!(trace_id, stage = %event.stage, status = %event.status, attempt, "Stage {} {}", event.stage, event.status);
        } else {
            info!(trace_id, stage = %event.stage, status = %event.status, attempt, "Stage {} {}", event.stage, event.status);
        }
    }
}

/// A collecting sink for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<StageEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.read().clone()
    }

    /// Returns `stage:status` labels, handy for asserting on event order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| format!("{}:{}", e.stage, e.status))
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn on_event(&self, event: &StageEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;
    use crate::events::EventBus;
    use std::sync::Arc;

    #[test]
    fn test_noop_sink() {
        NoOpEventSink.on_event(&StageEvent::start(StageId::Init));
    }

    #[test]
    fn test_logging_sink() {
        let sink = LoggingEventSink::debug().with_trace_id("t-1");
        sink.on_event(&StageEvent::start(StageId::Init).with_attempt(1));
        sink.on_event(&StageEvent::error(StageId::Init, "boom"));
    }

    #[test]
    fn test_collecting_sink_via_bus() {
        let bus = EventBus::new();
        let sink = Arc::new(CollectingEventSink::new());
        bus.subscribe_sink(sink.clone());

        bus.emit(StageEvent::start(StageId::Draft));
        bus.emit(StageEvent::error(StageId::Draft, "bad json"));

        assert_eq!(sink.labels(), vec!["draft:start", "draft:error"]);
        sink.clear();
        assert!(sink.is_empty());
    }
}
