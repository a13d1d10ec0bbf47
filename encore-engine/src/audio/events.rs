//! AudioSink lifecycle events
//!
//! Sinks report resource lifecycle on an unbounded channel; the orchestrator
//! routes each event to the owning session's worker so events for one tenant
//! are applied in emission order.

use super::sink::ResourceId;
use encore_common::TenantId;
use tokio::sync::mpsc;

/// Lifecycle change of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEventKind {
    /// Audio became audible
    Started,
    /// Resource reached its end (or was stopped)
    Finished,
    /// Unrecoverable playback error
    Errored(String),
}

/// Event emitted by an AudioSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub tenant_id: TenantId,
    pub resource: ResourceId,
    pub kind: SinkEventKind,
}

impl SinkEvent {
    pub fn started(tenant_id: TenantId, resource: ResourceId) -> Self {
        Self { tenant_id, resource, kind: SinkEventKind::Started }
    }

    pub fn finished(tenant_id: TenantId, resource: ResourceId) -> Self {
        Self { tenant_id, resource, kind: SinkEventKind::Finished }
    }

    pub fn errored(tenant_id: TenantId, resource: ResourceId, reason: impl Into<String>) -> Self {
        Self { tenant_id, resource, kind: SinkEventKind::Errored(reason.into()) }
    }
}

pub type SinkEventSender = mpsc::UnboundedSender<SinkEvent>;
pub type SinkEventReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// Create the channel a sink emits on and the orchestrator consumes
pub fn sink_event_channel() -> (SinkEventSender, SinkEventReceiver) {
    mpsc::unbounded_channel()
}
