//! Search / metadata provider capability

use crate::track::Track;
use async_trait::async_trait;
use thiserror::Error;

/// TrackResolver failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("resolver failed: {0}")]
    Failed(String),
}

/// Turns free text or direct references into track candidates
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Search for up to `limit` candidates; may return fewer or none
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolverError>;

    /// Resolve a direct reference (URL or id) to a single track
    async fn resolve_direct(&self, reference: &str) -> Result<Track, ResolverError>;
}
