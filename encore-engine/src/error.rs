//! Error types for encore-engine
//!
//! Every rejected operation maps to its own variant so the calling layer can
//! render a precise message.

use crate::audio::SinkError;
use encore_common::TenantId;
use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Enqueue beyond the configured maximum
    #[error("Queue is full: maximum {max} tracks allowed")]
    QueueFull { max: usize },

    /// 1-based queue position does not exist
    #[error("Position {position} is out of range (queue has {len} tracks)")]
    PositionOutOfRange { position: usize, len: usize },

    /// Position 1 is the current track and must be skipped instead
    #[error("Cannot remove the current track, skip it instead")]
    CannotRemoveCurrent,

    /// Shuffle needs at least two tracks
    #[error("Not enough tracks to shuffle ({len})")]
    InsufficientTracks { len: usize },

    /// Volume outside [0, max]
    #[error("Volume {level} is out of range (0-{max})")]
    VolumeOutOfRange { level: i64, max: u16 },

    /// Loop mode name not recognised
    #[error("Invalid loop mode: {0}")]
    InvalidLoopMode(String),

    /// No track is active
    #[error("Nothing is currently playing")]
    NothingPlaying,

    /// Pause requested while paused
    #[error("Playback is already paused")]
    AlreadyPaused,

    /// Resume requested while not paused
    #[error("Playback is not paused")]
    NotPaused,

    /// AudioSink could not turn a track into a playable resource
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Tenant has no live session
    #[error("No session for tenant {0}")]
    SessionNotFound(TenantId),

    /// AudioSink refused to bind the voice endpoint
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Direct reference did not resolve to a track
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// Seek target at or beyond the track duration
    #[error("Cannot seek to {seconds}s, track duration is {duration}s")]
    SeekOutOfRange { seconds: u64, duration: u64 },

    /// AudioSink cannot seek
    #[error("Seeking is not supported by the audio backend")]
    SeekUnsupported,

    /// AudioSink does not implement the named operation
    #[error("Audio backend does not support {0}")]
    Unsupported(&'static str),

    /// Transport-level failure other than resolution
    #[error("Audio sink error: {0}")]
    Sink(String),

    /// Command-layer authorization rejected the actor
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Sink event dispatcher started twice
    #[error("Sink event dispatcher already started")]
    AlreadyStarted,

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from encore-common
    #[error(transparent)]
    Common(#[from] encore_common::Error),
}

impl From<SinkError> for Error {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Resolution(msg) => Error::Resolution(msg),
            SinkError::Unsupported("seek") => Error::SeekUnsupported,
            SinkError::Unsupported(operation) => Error::Unsupported(operation),
            SinkError::Transport(msg) => Error::Sink(msg),
        }
    }
}

/// Convenience Result type using encore-engine Error
pub type Result<T> = std::result::Result<T, Error>;
