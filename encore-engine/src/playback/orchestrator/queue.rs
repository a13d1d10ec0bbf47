//! Queue operations module
//!
//! **Responsibilities:**
//! - Queue mutations (enqueue, enqueue by reference, remove, shuffle)
//! - Stop (clear queue, release the resource, destroy unless sticky)
//! - Queue event emission (QueueChanged)

use super::core::PlaybackOrchestrator;
use crate::error::{Error, Result};
use crate::resolver::ResolverError;
use crate::track::{Requester, Track};
use encore_common::events::{DestroyReason, EncoreEvent, LoopMode, QueueChangeTrigger, SessionStatus};
use encore_common::{TenantId, TextTarget, VoiceTarget};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl PlaybackOrchestrator {
    /// Append a track to the tenant's queue, creating the session if needed
    ///
    /// Returns the 1-based queue position. An idle session starts playing
    /// in the background; a pending idle timer is cancelled.
    pub async fn enqueue(
        self: &Arc<Self>,
        tenant_id: &TenantId,
        voice_target: &VoiceTarget,
        text_target: &TextTarget,
        track: Track,
    ) -> Result<usize> {
        let title = track.title().to_string();

        for _ in 0..2 {
            let session = self.ensure_session(tenant_id, voice_target, text_target).await?;
            let (position, length, start) = {
                let mut state = session.lock().await;
                if state.destroyed {
                    // Torn down between lookup and lock; retry on a fresh session
                    continue;
                }
                let position = state.queue.enqueue(track.clone())?;
                if state.idle_timer.disarm() {
                    state.bump_generation();
                    debug!("Idle timer cancelled by enqueue for tenant {}", tenant_id);
                }
                (position, state.queue.len(), state.can_start())
            };

            info!("Enqueued '{}' at position {} for tenant {}", title, position, tenant_id);
            self.emit_queue_changed(&session, length, QueueChangeTrigger::UserEnqueue);
            if start {
                self.spawn_advance(&session);
            }
            return Ok(position);
        }
        Err(Error::SessionNotFound(tenant_id.clone()))
    }

    /// Resolve a direct reference through the TrackResolver and enqueue it
    pub async fn enqueue_reference(
        self: &Arc<Self>,
        tenant_id: &TenantId,
        voice_target: &VoiceTarget,
        text_target: &TextTarget,
        reference: &str,
        requester: Requester,
    ) -> Result<(usize, Track)> {
        let track = self
            .resolver
            .resolve_direct(reference)
            .await
            .map_err(|e| match e {
                ResolverError::NotFound(r) => Error::TrackNotFound(r),
                ResolverError::Failed(msg) => Error::Resolution(msg),
            })?
            .with_requester(requester);

        let position = self
            .enqueue(tenant_id, voice_target, text_target, track.clone())
            .await?;
        Ok((position, track))
    }

    /// Remove the track at a 1-based position (1 is rejected, use skip)
    pub async fn remove(&self, tenant_id: &TenantId, position: usize) -> Result<Track> {
        let session = self.session(tenant_id)?;
        let (removed, length) = {
            let mut state = session.lock().await;
            if state.destroyed {
                return Err(Error::SessionNotFound(tenant_id.clone()));
            }
            let removed = state.queue.remove(position)?;
            (removed, state.queue.len())
        };

        info!(
            "Removed '{}' from position {} for tenant {}",
            removed.title(),
            position,
            tenant_id
        );
        self.emit_queue_changed(&session, length, QueueChangeTrigger::UserRemove);
        Ok(removed)
    }

    /// Shuffle everything after the current track
    pub async fn shuffle(&self, tenant_id: &TenantId) -> Result<()> {
        let session = self.session(tenant_id)?;
        let length = {
            let mut state = session.lock().await;
            if state.destroyed {
                return Err(Error::SessionNotFound(tenant_id.clone()));
            }
            state.queue.shuffle()?;
            state.queue.len()
        };

        info!("Shuffled {} tracks for tenant {}", length.saturating_sub(1), tenant_id);
        self.emit_queue_changed(&session, length, QueueChangeTrigger::Shuffle);
        Ok(())
    }

    /// Clear the queue and stop playback
    ///
    /// A non-sticky session is destroyed. A sticky session stays alive,
    /// idle and empty, with loop mode reset to Off.
    pub async fn stop(&self, tenant_id: &TenantId) -> Result<()> {
        let session = self.session(tenant_id)?;

        if self
            .teardown(&session, DestroyReason::Stopped, |state| !state.sticky)
            .await
            .is_some()
        {
            info!("Stopped and disconnected tenant {}", tenant_id);
            return Ok(());
        }

        let resource = {
            let mut state = session.lock().await;
            if state.destroyed {
                return Ok(());
            }
            state.revoke_pending();
            state.progress_ticker.disarm();
            state.bump_generation();

            if let Some(track) = state.resource.and_then(|_| state.queue.current().cloned()) {
                self.emit(EncoreEvent::TrackFinished {
                    tenant_id: tenant_id.clone(),
                    session_id: session.id(),
                    reference: track.reference().to_string(),
                    elapsed_secs: state.elapsed(Instant::now()),
                    completed: false,
                    timestamp: chrono::Utc::now(),
                });
            }

            state.queue.clear();
            state.loop_mode = LoopMode::Off;
            state.clock.reset();
            let change = state.transition(SessionStatus::Idle);
            self.emit_state_change(&session, change);
            self.emit_queue_changed(&session, 0, QueueChangeTrigger::Stop);
            state.resource.take()
        };

        if let Some(resource) = resource {
            if let Err(e) = self.sink.stop(resource).await {
                warn!("Failed to stop {} for tenant {}: {}", resource, tenant_id, e);
            }
        }
        info!("Stopped tenant {} (24/7 session kept)", tenant_id);
        Ok(())
    }
}
