//! Transport control and session settings
//!
//! **Responsibilities:**
//! - Skip, pause, resume, seek
//! - Volume, loop mode, autoplay and 24/7 flags
//! - Disconnect and endpoint signals (transport lost, moved, occupancy)
//!
//! Every operation validates against the session state under the session
//! lock and returns a distinct error kind on rejection.

use super::core::{FinishReason, PlaybackOrchestrator};
use crate::error::{Error, Result};
use crate::notify::NotificationKind;
use crate::track::Track;
use encore_common::events::{DestroyReason, LoopMode, SessionStatus};
use encore_common::{TenantId, VoiceTarget};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl PlaybackOrchestrator {
    /// Finish the current track immediately and advance
    ///
    /// Shares the completion path with natural finishes, except that a
    /// single-track loop is overridden for this one finish. Returns the
    /// skipped track.
    pub async fn skip(self: &Arc<Self>, tenant_id: &TenantId) -> Result<Track> {
        let session = self.session(tenant_id)?;
        let (resource, skipped) = {
            let mut state = session.lock().await;
            if state.destroyed {
                return Err(Error::SessionNotFound(tenant_id.clone()));
            }
            let resource = state.active_resource()?;
            let skipped = self.finish_locked(&session, &mut state, FinishReason::Skipped);
            (resource, skipped)
        };

        if let Err(e) = self.sink.stop(resource).await {
            warn!("Failed to stop skipped {} for tenant {}: {}", resource, tenant_id, e);
        }
        self.spawn_advance(&session);

        let skipped = skipped.ok_or(Error::NothingPlaying)?;
        info!("Skipped '{}' for tenant {}", skipped.title(), tenant_id);
        Ok(skipped)
    }

    pub async fn pause(self: &Arc<Self>, tenant_id: &TenantId) -> Result<()> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        let resource = state.check_pause()?;
        self.sink.pause(resource).await?;

        state.clock.pause(Instant::now());
        state.progress_ticker.disarm();
        state.bump_generation();
        let change = state.transition(SessionStatus::Paused);
        drop(state);

        self.emit_state_change(&session, change);
        info!("Paused tenant {}", tenant_id);
        Ok(())
    }

    pub async fn resume(self: &Arc<Self>, tenant_id: &TenantId) -> Result<()> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        let resource = state.check_resume()?;
        self.sink.resume(resource).await?;

        state.clock.resume(Instant::now());
        state.bump_generation();
        let change = state.transition(SessionStatus::Playing);
        self.arm_progress_ticker(&session, &mut state);
        drop(state);

        self.emit_state_change(&session, change);
        info!("Resumed tenant {}", tenant_id);
        Ok(())
    }

    /// Jump to `seconds` in the current track
    pub async fn seek(&self, tenant_id: &TenantId, seconds: u64) -> Result<()> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        let resource = state.check_seek(seconds)?;
        self.sink.seek(resource, seconds).await?;
        state.clock.rebase(Instant::now(), seconds);

        info!("Seeked to {}s for tenant {}", seconds, tenant_id);
        Ok(())
    }

    /// Set volume (0 - max_volume), applied immediately to an active resource
    pub async fn set_volume(&self, tenant_id: &TenantId, level: i64) -> Result<u16> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        let volume = state.set_volume(level)?;
        if let Some(resource) = state.resource {
            if let Err(e) = self.sink.set_volume(resource, state.gain()).await {
                warn!("Failed to apply volume to {}: {}", resource, e);
            }
        }

        info!("Volume set to {} for tenant {}", volume, tenant_id);
        Ok(volume)
    }

    pub async fn set_loop_mode(&self, tenant_id: &TenantId, mode: LoopMode) -> Result<LoopMode> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        state.loop_mode = mode;
        info!("Loop mode set to {} for tenant {}", mode, tenant_id);
        Ok(mode)
    }

    /// Set loop mode by name (off, single/track/song, queue/all)
    pub async fn set_loop_mode_str(&self, tenant_id: &TenantId, name: &str) -> Result<LoopMode> {
        let mode: LoopMode = name.parse().map_err(|e: encore_common::events::UnknownLoopMode| {
            Error::InvalidLoopMode(e.0)
        })?;
        self.set_loop_mode(tenant_id, mode).await
    }

    /// Cycle Off -> Single -> Queue -> Off; returns the new mode
    pub async fn toggle_loop(&self, tenant_id: &TenantId) -> Result<LoopMode> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        state.loop_mode = state.loop_mode.next();
        info!("Loop mode toggled to {} for tenant {}", state.loop_mode, tenant_id);
        Ok(state.loop_mode)
    }

    pub async fn set_autoplay(&self, tenant_id: &TenantId, enabled: bool) -> Result<()> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        state.autoplay_enabled = enabled;
        info!("Autoplay {} for tenant {}", if enabled { "enabled" } else { "disabled" }, tenant_id);
        Ok(())
    }

    /// Toggle 24/7 mode
    ///
    /// Enabling cancels the idle and vacancy timers; disabling re-arms them
    /// when their conditions hold.
    pub async fn set_sticky(self: &Arc<Self>, tenant_id: &TenantId, enabled: bool) -> Result<()> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        state.sticky = enabled;
        if enabled {
            let idle = state.idle_timer.disarm();
            let vacancy = state.vacancy_timer.disarm();
            debug!("24/7 on, cancelled timers (idle={}, vacancy={})", idle, vacancy);
        } else {
            if state.needs_idle_timer() {
                self.arm_idle_timer(&session, &mut state);
            }
            if state.needs_vacancy_timer() {
                self.arm_vacancy_timer(&session, &mut state);
            }
        }
        info!("24/7 mode {} for tenant {}", if enabled { "enabled" } else { "disabled" }, tenant_id);
        Ok(())
    }

    /// Explicit disconnect; destroys the session regardless of 24/7 mode
    ///
    /// Returns false when the tenant had no session.
    pub async fn disconnect(&self, tenant_id: &TenantId) -> bool {
        let Some(session) = self.registry.get(tenant_id) else {
            return false;
        };
        self.teardown(&session, DestroyReason::Disconnected, |_| true)
            .await
            .is_some()
    }

    /// The transport reported a terminal disconnect
    pub async fn on_transport_lost(&self, tenant_id: &TenantId) -> bool {
        let Some(session) = self.registry.get(tenant_id) else {
            return false;
        };
        match self.teardown(&session, DestroyReason::TransportLost, |_| true).await {
            Some(text_target) => {
                self.notify(
                    text_target,
                    NotificationKind::Disconnected,
                    "Disconnected from the voice channel".to_string(),
                );
                true
            }
            None => false,
        }
    }

    /// The voice endpoint migrated; the session and its queue survive
    pub async fn on_endpoint_moved(&self, tenant_id: &TenantId, new_target: VoiceTarget) -> Result<()> {
        let session = self.session(tenant_id)?;
        let (old_target, text_target) = {
            let mut state = session.lock().await;
            if state.destroyed {
                return Err(Error::SessionNotFound(tenant_id.clone()));
            }
            if let Some(connection) = state.connection.as_mut() {
                connection.voice_target = new_target.clone();
            }
            let old = std::mem::replace(&mut state.voice_target, new_target.clone());
            (old, state.text_target.clone())
        };

        info!("Tenant {} moved from {} to {}", tenant_id, old_target, new_target);
        self.notify(
            text_target,
            NotificationKind::ChannelChanged,
            format!("Moved to {}", new_target),
        );
        Ok(())
    }

    /// Record the number of humans in the bound endpoint
    ///
    /// Zero humans on a non-sticky session arms the vacancy timer (once);
    /// anyone returning cancels it.
    pub async fn on_occupancy_changed(self: &Arc<Self>, tenant_id: &TenantId, humans: usize) -> Result<()> {
        let session = self.session(tenant_id)?;
        let mut state = session.lock().await;
        if state.destroyed {
            return Err(Error::SessionNotFound(tenant_id.clone()));
        }
        state.human_occupants = Some(humans);

        if state.needs_vacancy_timer() {
            if !state.vacancy_timer.is_armed() {
                self.arm_vacancy_timer(&session, &mut state);
            }
        } else if state.vacancy_timer.disarm() {
            debug!("Vacancy timer cancelled for tenant {} ({} humans)", tenant_id, humans);
        }
        Ok(())
    }
}
