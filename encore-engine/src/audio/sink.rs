//! AudioSink trait and transport handles

use crate::track::Track;
use async_trait::async_trait;
use encore_common::{TenantId, VoiceTarget};
use std::fmt;
use thiserror::Error;

/// Handle to one active audio resource (a track being streamed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// Transport binding to a voice endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub id: u64,
    pub tenant_id: TenantId,
    pub voice_target: VoiceTarget,
}

/// AudioSink failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Track reference could not be turned into a playable stream
    #[error("{0}")]
    Resolution(String),

    /// Operation not supported by this backend
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// Connection or resource level failure
    #[error("{0}")]
    Transport(String),
}

/// Audio transport capability
///
/// Implementations emit [`crate::audio::SinkEvent`]s (Started / Finished /
/// Errored) for every resource they hand out, on the sender they were given
/// at construction.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Bind a voice endpoint for a tenant
    async fn bind(&self, tenant_id: &TenantId, target: &VoiceTarget) -> Result<Connection, SinkError>;

    /// Resolve a track into a playing resource on the connection
    ///
    /// May take unbounded time; the engine never holds a session lock across it.
    async fn play(&self, connection: &Connection, track: &Track) -> Result<ResourceId, SinkError>;

    /// Apply linear gain (0.0 - 2.0) to an active resource
    async fn set_volume(&self, resource: ResourceId, gain: f32) -> Result<(), SinkError>;

    async fn pause(&self, resource: ResourceId) -> Result<(), SinkError>;

    async fn resume(&self, resource: ResourceId) -> Result<(), SinkError>;

    /// Jump to a position in the active resource
    async fn seek(&self, _resource: ResourceId, _position_secs: u64) -> Result<(), SinkError> {
        Err(SinkError::Unsupported("seek"))
    }

    /// Finish a resource immediately
    async fn stop(&self, resource: ResourceId) -> Result<(), SinkError>;

    /// Tear down a connection
    async fn release(&self, connection: Connection) -> Result<(), SinkError>;
}
