//! Track model
//!
//! A Track describes one playable item plus the metadata recorded when it
//! was queued. Tracks are immutable once built; queue position is tracked by
//! the queue, never by the track.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who asked for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Requester {
    /// A member of the tenant community
    User { id: String, name: String },
    /// Added by the autoplay planner
    Autoplay,
}

impl Requester {
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Requester::User {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Actor id for user requests, None for autoplay
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Requester::User { id, .. } => Some(id),
            Requester::Autoplay => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Requester::User { name, .. } => name,
            Requester::Autoplay => "Autoplay",
        }
    }
}

/// Origin catalog metadata reported by the search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Provider name (e.g. a video site or streaming catalog)
    pub provider: String,
    /// Provider-side entry id
    pub entry_id: Option<String>,
    /// Uploader or artist as reported by the provider
    pub uploader: Option<String>,
}

/// Immutable description of a playable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    reference: String,
    title: String,
    duration_secs: Option<u64>,
    thumbnail: Option<String>,
    requester: Requester,
    enqueued_at: DateTime<Utc>,
    source: Option<SourceInfo>,
}

impl Track {
    /// Create a track with unknown duration, stamped with the current time
    pub fn new(reference: impl Into<String>, title: impl Into<String>, requester: Requester) -> Self {
        Self {
            reference: reference.into(),
            title: title.into(),
            duration_secs: None,
            thumbnail: None,
            requester,
            enqueued_at: encore_common::time::now(),
            source: None,
        }
    }

    /// Set the duration; zero means unknown
    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = (secs > 0).then_some(secs);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the requester (used when a resolved candidate is claimed by a user)
    pub fn with_requester(mut self, requester: Requester) -> Self {
        self.requester = requester;
        self
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_secs
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    /// Lowercased title with collapsed whitespace, used for duplicate detection
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Lowercase and collapse whitespace
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
