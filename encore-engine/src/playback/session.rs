//! Per-tenant session state
//!
//! **Responsibilities:**
//! - Session identity and the per-session serialization lock
//! - SessionState: queue, status, volume, loop/autoplay/sticky flags, clock,
//!   transport handles, timers
//! - Synchronous validation for every command (range and state checks)
//! - Inbox for AudioSink events addressed to this session
//!
//! All mutation goes through `Session::lock`. The orchestrator is the only
//! caller that holds the lock across transitions; it never holds it across
//! `AudioSink::play` or an autoplay proposal.

use super::clock::ClockState;
use super::queue::TrackQueue;
use super::timers::TimerSlot;
use crate::audio::{Connection, ResourceId, SinkEvent};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::track::Track;
use chrono::{DateTime, Utc};
use encore_common::events::{LoopMode, SessionStatus};
use encore_common::{TenantId, TextTarget, VoiceTarget};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::time::Instant;
use uuid::Uuid;

/// Limits and defaults applied to new sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub max_queue_size: usize,
    pub history_capacity: usize,
    pub default_volume: u16,
    pub max_volume: u16,
}

impl From<&EngineConfig> for SessionSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            history_capacity: config.history_capacity,
            default_volume: config.default_volume,
            max_volume: config.max_volume,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Mutable session state, guarded by the session lock
#[derive(Debug)]
pub struct SessionState {
    pub queue: TrackQueue,
    pub status: SessionStatus,
    pub volume: u16,
    pub max_volume: u16,
    pub loop_mode: LoopMode,
    pub autoplay_enabled: bool,
    /// 24/7 mode: no idle or vacancy teardown
    pub sticky: bool,
    pub clock: ClockState,
    pub voice_target: VoiceTarget,
    pub text_target: TextTarget,

    /// Transport binding, None until bound
    pub connection: Option<Connection>,
    /// Active resource for queue[0]; Some iff status != Idle
    pub resource: Option<ResourceId>,

    /// Ticket of the in-flight resolution or autoplay proposal
    pub pending: Option<u64>,
    next_ticket: u64,
    /// Terminal sink events that arrived before their resource was recorded
    pub early_events: Vec<SinkEvent>,

    /// Bumped on every transition; timers compare it on firing
    pub generation: u64,

    /// Humans in the bound voice endpoint, None until reported
    pub human_occupants: Option<usize>,

    /// Set once by teardown; every later operation treats the session as gone
    pub destroyed: bool,

    pub idle_timer: TimerSlot,
    pub progress_ticker: TimerSlot,
    pub vacancy_timer: TimerSlot,
}

impl SessionState {
    pub fn new(voice_target: VoiceTarget, text_target: TextTarget, settings: SessionSettings) -> Self {
        Self {
            queue: TrackQueue::new(settings.max_queue_size, settings.history_capacity),
            status: SessionStatus::Idle,
            volume: settings.default_volume.min(settings.max_volume),
            max_volume: settings.max_volume,
            loop_mode: LoopMode::Off,
            autoplay_enabled: false,
            sticky: false,
            clock: ClockState::default(),
            voice_target,
            text_target,
            connection: None,
            resource: None,
            pending: None,
            next_ticket: 0,
            early_events: Vec::new(),
            generation: 0,
            human_occupants: None,
            destroyed: false,
            idle_timer: TimerSlot::new(),
            progress_ticker: TimerSlot::new(),
            vacancy_timer: TimerSlot::new(),
        }
    }

    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Mark an async operation in flight; returns its ticket
    pub fn begin_pending(&mut self) -> u64 {
        self.next_ticket += 1;
        self.pending = Some(self.next_ticket);
        self.next_ticket
    }

    pub fn is_pending(&self, ticket: u64) -> bool {
        !self.destroyed && self.pending == Some(ticket)
    }

    /// Revoke the in-flight operation; its result will be discarded
    pub fn revoke_pending(&mut self) {
        self.pending = None;
        self.early_events.clear();
    }

    /// Idle with a queued head, nothing in flight
    pub fn can_start(&self) -> bool {
        !self.destroyed
            && self.status == SessionStatus::Idle
            && self.pending.is_none()
            && self.resource.is_none()
            && !self.queue.is_empty()
    }

    /// Empty, idle, non-sticky, nothing in flight
    pub fn needs_idle_timer(&self) -> bool {
        !self.destroyed
            && !self.sticky
            && self.status == SessionStatus::Idle
            && self.pending.is_none()
            && self.queue.is_empty()
    }

    /// Every human left and the session is not sticky
    pub fn needs_vacancy_timer(&self) -> bool {
        !self.destroyed && !self.sticky && self.human_occupants == Some(0)
    }

    /// Validate and apply a volume level
    pub fn set_volume(&mut self, level: i64) -> Result<u16> {
        if level < 0 || level > i64::from(self.max_volume) {
            return Err(Error::VolumeOutOfRange {
                level,
                max: self.max_volume,
            });
        }
        self.volume = level as u16;
        Ok(self.volume)
    }

    /// Linear gain for the AudioSink (volume 100 = unity)
    pub fn gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    /// Resource of the current track, NothingPlaying when Idle
    pub fn active_resource(&self) -> Result<ResourceId> {
        match (self.status, self.resource) {
            (SessionStatus::Idle, _) | (_, None) => Err(Error::NothingPlaying),
            (_, Some(resource)) => Ok(resource),
        }
    }

    pub fn check_pause(&self) -> Result<ResourceId> {
        let resource = self.active_resource()?;
        if self.status == SessionStatus::Paused {
            return Err(Error::AlreadyPaused);
        }
        Ok(resource)
    }

    pub fn check_resume(&self) -> Result<ResourceId> {
        let resource = self.active_resource()?;
        if self.status != SessionStatus::Paused {
            return Err(Error::NotPaused);
        }
        Ok(resource)
    }

    /// Seek target must lie before the end of a known duration
    pub fn check_seek(&self, seconds: u64) -> Result<ResourceId> {
        let resource = self.active_resource()?;
        if let Some(duration) = self.queue.current().and_then(Track::duration_secs) {
            if seconds >= duration {
                return Err(Error::SeekOutOfRange { seconds, duration });
            }
        }
        Ok(resource)
    }

    /// Set status, returning (old, new) when it changed
    pub fn transition(&mut self, new: SessionStatus) -> Option<(SessionStatus, SessionStatus)> {
        let old = self.status;
        if old == new {
            return None;
        }
        self.status = new;
        Some((old, new))
    }

    /// Elapsed seconds of the current track
    pub fn elapsed(&self, now: Instant) -> u64 {
        if self.status == SessionStatus::Idle {
            return 0;
        }
        let duration = self.queue.current().and_then(Track::duration_secs);
        self.clock.elapsed(now, duration)
    }
}

/// One tenant's live session
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    tenant_id: TenantId,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,

    /// Inbox of AudioSink events for this session's worker
    inbox_tx: mpsc::UnboundedSender<SinkEvent>,

    /// Inbox receiver, taken once by the worker on creation
    inbox_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<SinkEvent>>>,
}

impl Session {
    pub fn new(
        tenant_id: TenantId,
        voice_target: VoiceTarget,
        text_target: TextTarget,
        settings: SessionSettings,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            created_at: Utc::now(),
            state: Mutex::new(SessionState::new(voice_target, text_target, settings)),
            inbox_tx,
            inbox_rx: std::sync::Mutex::new(Some(inbox_rx)),
        }
    }

    /// Instance id; a re-created session for the same tenant gets a new one
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Acquire the session's serialization lock
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Queue a sink event for the worker; false once the worker is gone
    pub fn deliver(&self, event: SinkEvent) -> bool {
        self.inbox_tx.send(event).is_ok()
    }

    /// Take the inbox receiver (only the first call gets it)
    pub fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<SinkEvent>> {
        match self.inbox_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}
