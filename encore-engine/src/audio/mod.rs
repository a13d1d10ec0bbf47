//! Audio transport capability
//!
//! The engine never touches audio bytes. It drives an injected [`AudioSink`]
//! and consumes the lifecycle events the sink reports back.

mod events;
mod sink;

pub use events::{sink_event_channel, SinkEvent, SinkEventKind, SinkEventReceiver, SinkEventSender};
pub use sink::{AudioSink, Connection, ResourceId, SinkError};
