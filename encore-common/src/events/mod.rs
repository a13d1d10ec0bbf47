//! Event types for the Encore event system
//!
//! Provides shared event definitions and the EventBus used by the engine to
//! publish session lifecycle, queue and progress updates.

mod playback_types;
mod queue_types;

pub use playback_types::{LoopMode, SessionStatus, UnknownLoopMode};
pub use queue_types::{DestroyReason, QueueChangeTrigger};

use crate::ids::TenantId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Encore event types
///
/// Every event names the tenant and the session instance it belongs to, so
/// subscribers can tell a destroyed session apart from its successor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EncoreEvent {
    /// A session was created for a tenant
    SessionCreated {
        tenant_id: TenantId,
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session was torn down
    SessionDestroyed {
        tenant_id: TenantId,
        session_id: Uuid,
        reason: DestroyReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current track resolved into an active resource
    TrackStarted {
        tenant_id: TenantId,
        session_id: Uuid,
        /// Track reference (URI or opaque id)
        reference: String,
        title: String,
        duration_secs: Option<u64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current track ended
    TrackFinished {
        tenant_id: TenantId,
        session_id: Uuid,
        reference: String,
        /// Seconds of audio heard
        elapsed_secs: u64,
        /// False when skipped, stopped or errored
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Status transition (Idle / Playing / Paused)
    PlaybackStateChanged {
        tenant_id: TenantId,
        session_id: Uuid,
        old_state: SessionStatus,
        new_state: SessionStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed
    QueueChanged {
        tenant_id: TenantId,
        session_id: Uuid,
        length: usize,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic progress report while playing
    PlaybackProgress {
        tenant_id: TenantId,
        session_id: Uuid,
        reference: String,
        elapsed_secs: u64,
        duration_secs: Option<u64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Autoplay appended tracks to an exhausted queue
    AutoplayFilled {
        tenant_id: TenantId,
        session_id: Uuid,
        added: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl EncoreEvent {
    /// Tenant the event belongs to
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            EncoreEvent::SessionCreated { tenant_id, .. }
            | EncoreEvent::SessionDestroyed { tenant_id, .. }
            | EncoreEvent::TrackStarted { tenant_id, .. }
            | EncoreEvent::TrackFinished { tenant_id, .. }
            | EncoreEvent::PlaybackStateChanged { tenant_id, .. }
            | EncoreEvent::QueueChanged { tenant_id, .. }
            | EncoreEvent::PlaybackProgress { tenant_id, .. }
            | EncoreEvent::AutoplayFilled { tenant_id, .. } => tenant_id,
        }
    }

    /// Event type name, as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            EncoreEvent::SessionCreated { .. } => "SessionCreated",
            EncoreEvent::SessionDestroyed { .. } => "SessionDestroyed",
            EncoreEvent::TrackStarted { .. } => "TrackStarted",
            EncoreEvent::TrackFinished { .. } => "TrackFinished",
            EncoreEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            EncoreEvent::QueueChanged { .. } => "QueueChanged",
            EncoreEvent::PlaybackProgress { .. } => "PlaybackProgress",
            EncoreEvent::AutoplayFilled { .. } => "AutoplayFilled",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Lagged subscribers lose the oldest events
///
/// # Examples
///
/// ```
/// use encore_common::events::EventBus;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
/// assert_eq!(event_bus.subscriber_count(), 1);
/// # drop(rx);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EncoreEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EncoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EncoreEvent,
    ) -> Result<usize, broadcast::error::SendError<EncoreEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EncoreEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
