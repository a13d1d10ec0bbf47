//! Playback-related type definitions
//!
//! Supporting types for session status and loop policy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Session playback status
///
/// Idle means no queue entry is resolved into an active audio resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Playing => write!(f, "playing"),
            SessionStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Loop policy applied when the current track finishes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Finished tracks leave the queue
    #[default]
    Off,
    /// The current track repeats
    Single,
    /// Finished tracks are re-appended to the tail
    Queue,
}

impl LoopMode {
    /// Next mode in the toggle cycle Off -> Single -> Queue -> Off
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Single,
            LoopMode::Single => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Single => write!(f, "single"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

/// Error returned when a loop mode name is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLoopMode(pub String);

impl std::fmt::Display for UnknownLoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown loop mode '{}'", self.0)
    }
}

impl std::error::Error for UnknownLoopMode {}

impl FromStr for LoopMode {
    type Err = UnknownLoopMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "single" | "track" | "song" => Ok(LoopMode::Single),
            "queue" | "all" => Ok(LoopMode::Queue),
            _ => Err(UnknownLoopMode(s.to_string())),
        }
    }
}
