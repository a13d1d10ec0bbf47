//! Queue and session lifecycle type definitions

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    UserEnqueue,
    UserRemove,
    Shuffle,
    TrackCompletion,
    ResolutionFailure,
    AutoplayFill,
    Stop,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::UserRemove => write!(f, "UserRemove"),
            QueueChangeTrigger::Shuffle => write!(f, "Shuffle"),
            QueueChangeTrigger::TrackCompletion => write!(f, "TrackCompletion"),
            QueueChangeTrigger::ResolutionFailure => write!(f, "ResolutionFailure"),
            QueueChangeTrigger::AutoplayFill => write!(f, "AutoplayFill"),
            QueueChangeTrigger::Stop => write!(f, "Stop"),
        }
    }
}

/// Why a session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DestroyReason {
    /// Idle timer fired with an empty queue
    IdleTimeout,
    /// Every human left the voice endpoint
    Vacancy,
    /// Explicit stop command on a non-sticky session
    Stopped,
    /// Explicit disconnect command
    Disconnected,
    /// Transport reported a terminal disconnect
    TransportLost,
}

impl std::fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestroyReason::IdleTimeout => write!(f, "IdleTimeout"),
            DestroyReason::Vacancy => write!(f, "Vacancy"),
            DestroyReason::Stopped => write!(f, "Stopped"),
            DestroyReason::Disconnected => write!(f, "Disconnected"),
            DestroyReason::TransportLost => write!(f, "TransportLost"),
        }
    }
}
