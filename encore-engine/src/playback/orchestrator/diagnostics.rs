//! Status queries
//!
//! **Responsibilities:**
//! - Session status, queue snapshot, elapsed time and history accessors
//! - Engine-wide accessors (session count, tenants, event bus, config)

use super::core::PlaybackOrchestrator;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::playback::session::Session;
use crate::track::Track;
use encore_common::events::{EncoreEvent, EventBus, LoopMode, SessionStatus};
use encore_common::{TenantId, TextTarget, VoiceTarget};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

/// Point-in-time view of one session
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub session_id: Uuid,
    pub tenant_id: TenantId,
    pub status: SessionStatus,
    /// Queued tracks, current first
    pub tracks: Vec<Track>,
    /// Completed tracks, oldest first
    pub history: Vec<Track>,
    pub volume: u16,
    pub loop_mode: LoopMode,
    pub autoplay_enabled: bool,
    pub sticky: bool,
    pub elapsed_secs: u64,
    pub voice_target: VoiceTarget,
    pub text_target: TextTarget,
    pub idle_timer_armed: bool,
    pub vacancy_timer_armed: bool,
}

impl PlaybackOrchestrator {
    async fn live_session(&self, tenant_id: &TenantId) -> Result<Arc<Session>> {
        let session = self.session(tenant_id)?;
        if session.lock().await.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        Ok(session)
    }

    pub async fn status(&self, tenant_id: &TenantId) -> Result<SessionStatus> {
        let session = self.live_session(tenant_id).await?;
        let status = session.lock().await.status;
        Ok(status)
    }

    pub async fn queue_snapshot(&self, tenant_id: &TenantId) -> Result<QueueSnapshot> {
        let session = self.live_session(tenant_id).await?;
        let state = session.lock().await;
        Ok(QueueSnapshot {
            session_id: session.id(),
            tenant_id: tenant_id.clone(),
            status: state.status,
            tracks: state.queue.snapshot(),
            history: state.queue.history(),
            volume: state.volume,
            loop_mode: state.loop_mode,
            autoplay_enabled: state.autoplay_enabled,
            sticky: state.sticky,
            elapsed_secs: state.elapsed(Instant::now()),
            voice_target: state.voice_target.clone(),
            text_target: state.text_target.clone(),
            idle_timer_armed: state.idle_timer.is_armed(),
            vacancy_timer_armed: state.vacancy_timer.is_armed(),
        })
    }

    /// Seconds heard of the current track (0 when idle)
    pub async fn elapsed_seconds(&self, tenant_id: &TenantId) -> Result<u64> {
        let session = self.live_session(tenant_id).await?;
        let elapsed = session.lock().await.elapsed(Instant::now());
        Ok(elapsed)
    }

    pub async fn history(&self, tenant_id: &TenantId) -> Result<Vec<Track>> {
        let session = self.live_session(tenant_id).await?;
        let history = session.lock().await.queue.history();
        Ok(history)
    }

    pub fn has_session(&self, tenant_id: &TenantId) -> bool {
        self.registry.get(tenant_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        self.registry.tenants()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EncoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
