//! Event bus and sinks for stage lifecycle events.
//!
//! Every run owns a recording [`EventBus`]; listeners and sinks subscribe
//! to it and receive events synchronously in emission order.

mod bus;
mod sink;

pub use bus::{EventBus, EventListener, Subscription};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
