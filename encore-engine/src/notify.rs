//! Tenant notification capability
//!
//! Notifications are fire-and-forget: the engine spawns the delivery and
//! only logs failures.

use async_trait::async_trait;
use encore_common::TextTarget;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// What a notification announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Session ended by transport loss or explicit disconnect
    Disconnected,
    /// Session ended by the idle or vacancy timer
    AutoDisconnect,
    /// Voice endpoint migrated
    ChannelChanged,
    /// Autoplay added tracks
    Autoplay,
    /// Every queued track failed to resolve
    PlaybackFailed,
}

#[derive(Error, Debug, Clone)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, target: &TextTarget, kind: NotificationKind, message: &str) -> Result<(), NotifyError>;
}

/// Deliver a notification in the background, logging failure
pub(crate) fn dispatch(
    notifier: &Arc<dyn NotificationSink>,
    target: TextTarget,
    kind: NotificationKind,
    message: String,
) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&target, kind, &message).await {
            warn!("Failed to deliver {:?} notification to {}: {}", kind, target, e);
        }
    });
}
