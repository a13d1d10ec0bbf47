//! Core orchestrator - construction, event wiring and transitions
//!
//! **Responsibilities:**
//! - PlaybackOrchestrator struct definition and initialization
//! - Sink event dispatch into per-session workers
//! - Start/advance loop: resolve queue[0], drop failures, autoplay, idle
//! - Session timers (idle, progress, vacancy) and their re-validation
//! - Session teardown
//!
//! Locking discipline: the session lock is held for every state transition
//! and released across `AudioSink::play` and autoplay proposals. Results of
//! those calls carry a pending ticket and are discarded when it was revoked.

use crate::audio::{AudioSink, ResourceId, SinkEvent, SinkEventKind, SinkEventReceiver};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::notify::{self, NotificationKind, NotificationSink};
use crate::playback::autoplay::{AutoplayPlanner, AutoplayProvider};
use crate::playback::registry::SessionRegistry;
use crate::playback::session::{Session, SessionSettings, SessionState};
use crate::resolver::TrackResolver;
use crate::track::Track;
use encore_common::events::{DestroyReason, EncoreEvent, EventBus, QueueChangeTrigger, SessionStatus};
use encore_common::{TenantId, TextTarget, VoiceTarget};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

/// External capabilities the orchestrator drives
#[derive(Clone)]
pub struct Capabilities {
    pub sink: Arc<dyn AudioSink>,
    pub resolver: Arc<dyn TrackResolver>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// How the current track ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FinishReason {
    /// Natural end reported by the sink
    Completed,
    /// Skip command; overrides single-track loop once
    Skipped,
    /// Unrecoverable sink error; the track is dropped
    Errored,
}

enum StartOutcome {
    Started,
    /// Resolution failed and the head was dropped
    Failed { remaining: usize },
    /// Queue empty
    Exhausted,
    /// Already playing or another start is in flight
    Busy,
    /// Session destroyed or the attempt was revoked
    Stale,
}

enum FillOutcome {
    /// Queue has tracks to try (autoplay or concurrent enqueues)
    Filled { len: usize },
    Empty,
    Stale,
}

/// Coordinates sessions, capabilities and timers
///
/// Shared as `Arc<PlaybackOrchestrator>`; background tasks (workers, timers,
/// advance loops) hold their own clones.
pub struct PlaybackOrchestrator {
    pub(super) config: EngineConfig,
    pub(super) registry: SessionRegistry,
    pub(super) sink: Arc<dyn AudioSink>,
    pub(super) resolver: Arc<dyn TrackResolver>,
    pub(super) notifier: Arc<dyn NotificationSink>,
    pub(super) autoplay: Arc<dyn AutoplayProvider>,
    pub(super) event_bus: EventBus,

    /// Sink event receiver, taken once by `start`
    sink_events: std::sync::Mutex<Option<SinkEventReceiver>>,
}

impl PlaybackOrchestrator {
    /// Create an orchestrator with the resolver-backed autoplay planner
    pub fn new(config: EngineConfig, caps: Capabilities, sink_events: SinkEventReceiver) -> Arc<Self> {
        let planner = AutoplayPlanner::new(Arc::clone(&caps.resolver), config.autoplay_cache_ttl());
        Self::with_autoplay(config, caps, sink_events, Arc::new(planner))
    }

    /// Create an orchestrator with a custom autoplay provider
    pub fn with_autoplay(
        config: EngineConfig,
        caps: Capabilities,
        sink_events: SinkEventReceiver,
        autoplay: Arc<dyn AutoplayProvider>,
    ) -> Arc<Self> {
        info!(
            "Creating playback orchestrator (max_queue={}, idle_timeout={}s)",
            config.max_queue_size, config.idle_timeout_secs
        );
        Arc::new(Self {
            registry: SessionRegistry::new(SessionSettings::from(&config)),
            event_bus: EventBus::new(config.event_bus_capacity),
            sink: caps.sink,
            resolver: caps.resolver,
            notifier: caps.notifier,
            autoplay,
            config,
            sink_events: std::sync::Mutex::new(Some(sink_events)),
        })
    }

    /// Start the sink event dispatcher
    ///
    /// Events are routed to the owning session's worker in emission order.
    /// The task ends when every sink event sender is dropped.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let rx = match self.sink_events.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let mut rx = rx.ok_or(Error::AlreadyStarted)?;

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            info!("Sink event dispatcher started");
            while let Some(event) = rx.recv().await {
                this.dispatch(event);
            }
            info!("Sink event channel closed, dispatcher stopped");
        }))
    }

    fn dispatch(&self, event: SinkEvent) {
        match self.registry.get(&event.tenant_id) {
            Some(session) => {
                if !session.deliver(event) {
                    warn!("Session {} worker is gone, sink event dropped", session.id());
                }
            }
            None => debug!(
                "No session for tenant {}, ignoring {:?} for {}",
                event.tenant_id, event.kind, event.resource
            ),
        }
    }

    /// Apply a sink event inline (bypassing the dispatcher)
    pub async fn on_sink_event(self: &Arc<Self>, event: SinkEvent) {
        match self.registry.get(&event.tenant_id) {
            Some(session) => self.handle_sink_event(&session, event).await,
            None => debug!("No session for tenant {}, ignoring sink event", event.tenant_id),
        }
    }

    fn spawn_worker(self: &Arc<Self>, session: &Arc<Session>) {
        let Some(mut inbox) = session.take_inbox() else {
            return;
        };
        let weak = Arc::downgrade(session);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = inbox.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                this.handle_sink_event(&session, event).await;
            }
        });
    }

    pub(super) async fn handle_sink_event(self: &Arc<Self>, session: &Arc<Session>, event: SinkEvent) {
        let resource = event.resource;
        {
            let mut state = session.lock().await;
            if state.destroyed {
                return;
            }
            if state.resource != Some(resource) {
                if state.pending.is_some() && event.kind != SinkEventKind::Started {
                    debug!("Holding {:?} for {} until its resolution completes", event.kind, resource);
                    state.early_events.push(event);
                } else {
                    debug!("Ignoring stale {:?} for {}", event.kind, resource);
                }
                return;
            }
            if event.kind == SinkEventKind::Started {
                // The clock already runs from the moment the resource was recorded
                debug!("{} audible for tenant {}", resource, session.tenant_id());
                return;
            }
        }

        match event.kind {
            SinkEventKind::Finished => {
                if self.finish_current(session, resource, FinishReason::Completed).await.is_some() {
                    self.advance(session, 0).await;
                }
            }
            SinkEventKind::Errored(reason) => {
                warn!(
                    "Playback error on {} for tenant {}: {}",
                    resource,
                    session.tenant_id(),
                    reason
                );
                if self.finish_current(session, resource, FinishReason::Errored).await.is_some() {
                    if let Err(e) = self.sink.stop(resource).await {
                        debug!("Stopping errored {} failed: {}", resource, e);
                    }
                    self.advance(session, 1).await;
                }
            }
            SinkEventKind::Started => {}
        }
    }

    // ========================================
    // Session lookup
    // ========================================

    pub(super) fn session(&self, tenant_id: &TenantId) -> Result<Arc<Session>> {
        self.registry
            .get(tenant_id)
            .ok_or_else(|| Error::SessionNotFound(tenant_id.clone()))
    }

    /// Look up or create the tenant's session and make sure it is bound
    pub(super) async fn ensure_session(
        self: &Arc<Self>,
        tenant_id: &TenantId,
        voice_target: &VoiceTarget,
        text_target: &TextTarget,
    ) -> Result<Arc<Session>> {
        for _ in 0..3 {
            let (session, created) = self.registry.get_or_create(tenant_id, voice_target, text_target);
            if created {
                self.spawn_worker(&session);
                self.emit(EncoreEvent::SessionCreated {
                    tenant_id: tenant_id.clone(),
                    session_id: session.id(),
                    timestamp: chrono::Utc::now(),
                });
                info!("Session {} created for tenant {}", session.id(), tenant_id);
            }

            let mut state = session.lock().await;
            if state.destroyed {
                // Lost a race with teardown; make sure the registry forgets it
                drop(state);
                self.registry.remove_instance(tenant_id, session.id());
                continue;
            }

            if state.connection.is_none() {
                let bound = self.sink.bind(tenant_id, &state.voice_target).await;
                match bound {
                    Ok(connection) => {
                        debug!("Bound {} for tenant {}", state.voice_target, tenant_id);
                        state.connection = Some(connection);
                    }
                    Err(e) => {
                        error!("Failed to bind {} for tenant {}: {}", state.voice_target, tenant_id, e);
                        drop(state);
                        self.teardown(&session, DestroyReason::TransportLost, |s| s.queue.is_empty())
                            .await;
                        return Err(Error::ConnectionFailed(e.to_string()));
                    }
                }
            }
            drop(state);
            return Ok(session);
        }
        Err(Error::SessionNotFound(tenant_id.clone()))
    }

    // ========================================
    // Event emission
    // ========================================

    pub(super) fn emit(&self, event: EncoreEvent) {
        self.event_bus.emit_lossy(event);
    }

    pub(super) fn emit_state_change(&self, session: &Session, change: Option<(SessionStatus, SessionStatus)>) {
        if let Some((old_state, new_state)) = change {
            debug!("Tenant {}: {} -> {}", session.tenant_id(), old_state, new_state);
            self.emit(EncoreEvent::PlaybackStateChanged {
                tenant_id: session.tenant_id().clone(),
                session_id: session.id(),
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    pub(super) fn emit_queue_changed(&self, session: &Session, length: usize, trigger: QueueChangeTrigger) {
        self.emit(EncoreEvent::QueueChanged {
            tenant_id: session.tenant_id().clone(),
            session_id: session.id(),
            length,
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_track_finished(&self, session: &Session, track: &Track, elapsed_secs: u64, completed: bool) {
        self.emit(EncoreEvent::TrackFinished {
            tenant_id: session.tenant_id().clone(),
            session_id: session.id(),
            reference: track.reference().to_string(),
            elapsed_secs,
            completed,
            timestamp: chrono::Utc::now(),
        });
    }

    pub(super) fn notify(&self, target: TextTarget, kind: NotificationKind, message: String) {
        notify::dispatch(&self.notifier, target, kind, message);
    }

    // ========================================
    // Finish / advance
    // ========================================

    /// Finish `resource` if it is still the session's active resource
    pub(super) async fn finish_current(
        &self,
        session: &Session,
        resource: ResourceId,
        reason: FinishReason,
    ) -> Option<Track> {
        let mut state = session.lock().await;
        if state.destroyed || state.resource != Some(resource) {
            debug!("{} already finished for tenant {}", resource, session.tenant_id());
            return None;
        }
        self.finish_locked(session, &mut state, reason)
    }

    /// Playing/Paused -> Idle, applying loop policy to the head track
    ///
    /// Caller holds the lock and has checked that a resource is active; the
    /// resource itself is not stopped here.
    pub(super) fn finish_locked(
        &self,
        session: &Session,
        state: &mut SessionState,
        reason: FinishReason,
    ) -> Option<Track> {
        let elapsed = state.elapsed(Instant::now());
        let current = state.queue.current().cloned();

        state.resource = None;
        state.progress_ticker.disarm();
        state.clock.reset();
        state.bump_generation();
        let change = state.transition(SessionStatus::Idle);

        let loop_mode = state.loop_mode;
        let trigger = match reason {
            FinishReason::Completed => {
                state.queue.finish_current(loop_mode, false);
                QueueChangeTrigger::TrackCompletion
            }
            FinishReason::Skipped => {
                state.queue.finish_current(loop_mode, true);
                QueueChangeTrigger::TrackCompletion
            }
            FinishReason::Errored => {
                state.queue.drop_current();
                QueueChangeTrigger::ResolutionFailure
            }
        };

        if let Some(track) = &current {
            info!(
                "Track '{}' finished for tenant {} ({:?}, {}s)",
                track.title(),
                session.tenant_id(),
                reason,
                elapsed
            );
            self.emit_track_finished(session, track, elapsed, reason == FinishReason::Completed);
        }
        self.emit_state_change(session, change);
        self.emit_queue_changed(session, state.queue.len(), trigger);
        current
    }

    pub(super) fn spawn_advance(self: &Arc<Self>, session: &Arc<Session>) {
        let this = Arc::clone(self);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            this.advance(&session, 0).await;
        });
    }

    /// Start the head track, dropping tracks that fail to resolve
    ///
    /// Bounded: each failure drops one track, and the loop gives up once it
    /// has failed as many times as the queue held when it started (plus what
    /// autoplay added). On exhaustion, autoplay is tried at most once, then
    /// the session idles.
    pub(super) async fn advance(self: &Arc<Self>, session: &Arc<Session>, prior_failures: usize) {
        let mut failures = prior_failures;
        let mut attempts = 0usize;
        let mut budget = session.lock().await.queue.len();
        let mut autoplay_tried = false;

        loop {
            match self.start_current(session).await {
                StartOutcome::Started | StartOutcome::Busy | StartOutcome::Stale => return,
                StartOutcome::Failed { remaining } => {
                    failures += 1;
                    attempts += 1;
                    if remaining > 0 && attempts >= budget {
                        warn!(
                            "Giving up on tenant {} after {} consecutive resolution failures",
                            session.tenant_id(),
                            attempts
                        );
                        self.report_failures(session, failures).await;
                        self.settle_idle(session).await;
                        return;
                    }
                }
                StartOutcome::Exhausted => {
                    if failures > 0 {
                        self.report_failures(session, failures).await;
                        failures = 0;
                    }
                    if !autoplay_tried {
                        autoplay_tried = true;
                        match self.autoplay_fill(session).await {
                            FillOutcome::Filled { len } => {
                                attempts = 0;
                                budget = len;
                                continue;
                            }
                            FillOutcome::Stale => return,
                            FillOutcome::Empty => {}
                        }
                    }
                    self.settle_idle(session).await;
                    return;
                }
            }
        }
    }

    async fn start_current(self: &Arc<Self>, session: &Arc<Session>) -> StartOutcome {
        // Phase 1: claim the head under the lock
        let (ticket, connection, track) = {
            let mut state = session.lock().await;
            if state.destroyed {
                return StartOutcome::Stale;
            }
            if state.status != SessionStatus::Idle || state.pending.is_some() || state.resource.is_some() {
                return StartOutcome::Busy;
            }
            let Some(track) = state.queue.current().cloned() else {
                return StartOutcome::Exhausted;
            };
            let Some(connection) = state.connection.clone() else {
                warn!("Tenant {} has no bound connection, cannot start", session.tenant_id());
                return StartOutcome::Stale;
            };
            (state.begin_pending(), connection, track)
        };

        // Phase 2: resolve without the lock
        debug!("Resolving '{}' for tenant {}", track.title(), session.tenant_id());
        let result = self.sink.play(&connection, &track).await;

        // Phase 3: apply, unless the attempt was revoked meanwhile
        let mut state = session.lock().await;
        if !state.is_pending(ticket) {
            drop(state);
            debug!("Discarding stale resolution of '{}'", track.title());
            if let Ok(resource) = result {
                if let Err(e) = self.sink.stop(resource).await {
                    debug!("Stopping stale {} failed: {}", resource, e);
                }
            }
            return StartOutcome::Stale;
        }
        state.pending = None;
        let early: Vec<SinkEvent> = std::mem::take(&mut state.early_events);

        match result {
            Ok(resource) => {
                state.resource = Some(resource);
                state.clock.start(Instant::now());
                state.idle_timer.disarm();
                state.bump_generation();
                let change = state.transition(SessionStatus::Playing);
                self.arm_progress_ticker(session, &mut state);
                let gain = state.gain();
                drop(state);

                info!(
                    "Now playing '{}' for tenant {} ({})",
                    track.title(),
                    session.tenant_id(),
                    resource
                );
                self.emit(EncoreEvent::TrackStarted {
                    tenant_id: session.tenant_id().clone(),
                    session_id: session.id(),
                    reference: track.reference().to_string(),
                    title: track.title().to_string(),
                    duration_secs: track.duration_secs(),
                    timestamp: chrono::Utc::now(),
                });
                self.emit_state_change(session, change);

                if let Err(e) = self.sink.set_volume(resource, gain).await {
                    warn!("Failed to apply volume to {}: {}", resource, e);
                }
                for event in early.into_iter().filter(|e| e.resource == resource) {
                    session.deliver(event);
                }
                StartOutcome::Started
            }
            Err(e) => {
                warn!(
                    "Failed to resolve '{}' for tenant {}: {}",
                    track.title(),
                    session.tenant_id(),
                    e
                );
                state.queue.drop_current();
                let remaining = state.queue.len();
                drop(state);
                self.emit_queue_changed(session, remaining, QueueChangeTrigger::ResolutionFailure);
                StartOutcome::Failed { remaining }
            }
        }
    }

    async fn autoplay_fill(self: &Arc<Self>, session: &Arc<Session>) -> FillOutcome {
        let (ticket, history) = {
            let mut state = session.lock().await;
            if state.destroyed || state.pending.is_some() || state.status != SessionStatus::Idle {
                return FillOutcome::Stale;
            }
            if !state.queue.is_empty() {
                return FillOutcome::Filled { len: state.queue.len() };
            }
            if !state.autoplay_enabled {
                return FillOutcome::Empty;
            }
            (state.begin_pending(), state.queue.history())
        };

        let count = self.config.autoplay_batch_size;
        info!("Autoplay requesting {} tracks for tenant {}", count, session.tenant_id());
        let proposals = match timeout(self.config.autoplay_timeout(), self.autoplay.propose(&history, count)).await {
            Ok(tracks) => tracks,
            Err(_) => {
                warn!(
                    "Autoplay timed out after {}ms for tenant {}",
                    self.config.autoplay_timeout_ms,
                    session.tenant_id()
                );
                Vec::new()
            }
        };

        let (added, len, text_target) = {
            let mut state = session.lock().await;
            if !state.is_pending(ticket) {
                debug!("Discarding stale autoplay result for tenant {}", session.tenant_id());
                return FillOutcome::Stale;
            }
            state.pending = None;
            state.early_events.clear();
            let added = state.queue.extend_autoplay(proposals);
            (added, state.queue.len(), state.text_target.clone())
        };

        if added > 0 {
            info!("Autoplay added {} tracks for tenant {}", added, session.tenant_id());
            self.emit_queue_changed(session, len, QueueChangeTrigger::AutoplayFill);
            self.emit(EncoreEvent::AutoplayFilled {
                tenant_id: session.tenant_id().clone(),
                session_id: session.id(),
                added,
                timestamp: chrono::Utc::now(),
            });
            self.notify(
                text_target,
                NotificationKind::Autoplay,
                format!("Autoplay added {} track{}", added, if added == 1 { "" } else { "s" }),
            );
        } else {
            info!("Autoplay found nothing for tenant {}", session.tenant_id());
        }

        if len == 0 {
            FillOutcome::Empty
        } else {
            FillOutcome::Filled { len }
        }
    }

    async fn report_failures(&self, session: &Session, failures: usize) {
        let text_target = session.lock().await.text_target.clone();
        self.notify(
            text_target,
            NotificationKind::PlaybackFailed,
            format!("Could not play the queued tracks ({} failed)", failures),
        );
    }

    /// Arm the idle timer when the session is empty, idle and not sticky
    async fn settle_idle(self: &Arc<Self>, session: &Arc<Session>) {
        let mut state = session.lock().await;
        if state.needs_idle_timer() {
            self.arm_idle_timer(session, &mut state);
        }
    }

    // ========================================
    // Timers
    // ========================================

    pub(super) fn arm_idle_timer(self: &Arc<Self>, session: &Arc<Session>, state: &mut SessionState) {
        let generation = state.generation;
        let deadline = Instant::now() + self.config.idle_timeout();
        let weak = Arc::downgrade(session);
        let this = Arc::clone(self);
        state.idle_timer.arm(move |token| async move {
            sleep_until(deadline).await;
            if let Some(session) = weak.upgrade() {
                this.on_idle_timeout(&session, token, generation).await;
            }
        });
        debug!(
            "Idle timer armed for tenant {} ({}s)",
            session.tenant_id(),
            self.config.idle_timeout_secs
        );
    }

    async fn on_idle_timeout(self: &Arc<Self>, session: &Arc<Session>, token: u64, generation: u64) {
        let teardown = self
            .teardown(session, DestroyReason::IdleTimeout, |state| {
                state.idle_timer.claim(token) && state.generation == generation && state.needs_idle_timer()
            })
            .await;

        match teardown {
            Some(text_target) => {
                let minutes = self.config.idle_timeout_secs / 60;
                self.notify(
                    text_target,
                    NotificationKind::AutoDisconnect,
                    format!("Left the voice channel after {} minutes of inactivity", minutes.max(1)),
                );
            }
            None => debug!("Stale idle timer ignored for tenant {}", session.tenant_id()),
        }
    }

    pub(super) fn arm_progress_ticker(self: &Arc<Self>, session: &Arc<Session>, state: &mut SessionState) {
        let generation = state.generation;
        let period = self.config.progress_interval();
        let weak = Arc::downgrade(session);
        let this = Arc::clone(self);
        state.progress_ticker.arm(move |token| async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if !this.report_progress(&session, token, generation).await {
                    break;
                }
            }
        });
    }

    async fn report_progress(&self, session: &Session, token: u64, generation: u64) -> bool {
        let state = session.lock().await;
        if !state.progress_ticker.is_current(token)
            || state.generation != generation
            || state.status != SessionStatus::Playing
        {
            return false;
        }
        let Some(track) = state.queue.current() else {
            return false;
        };
        self.emit(EncoreEvent::PlaybackProgress {
            tenant_id: session.tenant_id().clone(),
            session_id: session.id(),
            reference: track.reference().to_string(),
            elapsed_secs: state.elapsed(Instant::now()),
            duration_secs: track.duration_secs(),
            timestamp: chrono::Utc::now(),
        });
        true
    }

    pub(super) fn arm_vacancy_timer(self: &Arc<Self>, session: &Arc<Session>, state: &mut SessionState) {
        let deadline = Instant::now() + self.config.vacancy_grace();
        let weak = Arc::downgrade(session);
        let this = Arc::clone(self);
        state.vacancy_timer.arm(move |token| async move {
            sleep_until(deadline).await;
            if let Some(session) = weak.upgrade() {
                this.on_vacancy_timeout(&session, token).await;
            }
        });
        debug!(
            "Vacancy timer armed for tenant {} ({}s)",
            session.tenant_id(),
            self.config.vacancy_grace_secs
        );
    }

    async fn on_vacancy_timeout(self: &Arc<Self>, session: &Arc<Session>, token: u64) {
        let teardown = self
            .teardown(session, DestroyReason::Vacancy, |state| {
                state.vacancy_timer.claim(token) && state.needs_vacancy_timer()
            })
            .await;

        if let Some(text_target) = teardown {
            self.notify(
                text_target,
                NotificationKind::AutoDisconnect,
                "Left the voice channel because everyone left".to_string(),
            );
        }
    }

    // ========================================
    // Teardown
    // ========================================

    /// Destroy the session if `guard` approves, checked under the lock
    ///
    /// Cancels timers, revokes in-flight work, removes the session from the
    /// registry and releases transport handles. Sink failures are logged;
    /// in-memory teardown always completes. Returns the text target to
    /// notify when this call destroyed the session.
    pub(super) async fn teardown<F>(
        &self,
        session: &Arc<Session>,
        reason: DestroyReason,
        guard: F,
    ) -> Option<TextTarget>
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        let (resource, connection, finished, change, text_target) = {
            let mut state = session.lock().await;
            if state.destroyed || !guard(&mut state) {
                return None;
            }
            state.destroyed = true;
            state.revoke_pending();
            state.bump_generation();
            state.idle_timer.disarm();
            state.progress_ticker.disarm();
            state.vacancy_timer.disarm();

            let elapsed = state.elapsed(Instant::now());
            let finished = state
                .resource
                .and_then(|_| state.queue.current().cloned())
                .map(|track| (track, elapsed));
            let change = state.transition(SessionStatus::Idle);
            state.queue.clear();
            state.clock.reset();
            (
                state.resource.take(),
                state.connection.take(),
                finished,
                change,
                state.text_target.clone(),
            )
        };

        self.registry.remove_instance(session.tenant_id(), session.id());

        if let Some(resource) = resource {
            if let Err(e) = self.sink.stop(resource).await {
                warn!("Failed to stop {} during teardown: {}", resource, e);
            }
        }
        if let Some(connection) = connection {
            if let Err(e) = self.sink.release(connection).await {
                warn!("Failed to release connection during teardown: {}", e);
            }
        }

        if let Some((track, elapsed)) = finished {
            self.emit_track_finished(session, &track, elapsed, false);
        }
        self.emit_state_change(session, change);
        self.emit(EncoreEvent::SessionDestroyed {
            tenant_id: session.tenant_id().clone(),
            session_id: session.id(),
            reason,
            timestamp: chrono::Utc::now(),
        });
        info!(
            "Session {} for tenant {} destroyed ({})",
            session.id(),
            session.tenant_id(),
            reason
        );
        Some(text_target)
    }
}
