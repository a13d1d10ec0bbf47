//! Test helpers for encore-engine integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockAudioSink: records every call; tests drive Finished/Errored by hand
//! - MockResolver: canned direct lookups and search results
//! - RecordingNotifier: captures notifications
//! - ScriptedAutoplay: returns pre-loaded proposal batches
//! - Harness: an orchestrator wired to the mocks, dispatcher running

#![allow(dead_code)]

use async_trait::async_trait;
use encore_common::events::{EncoreEvent, SessionStatus};
use encore_common::{TenantId, TextTarget, VoiceTarget};
use encore_engine::audio::{
    sink_event_channel, AudioSink, Connection, ResourceId, SinkError, SinkEvent, SinkEventSender,
};
use encore_engine::notify::{NotificationKind, NotificationSink, NotifyError};
use encore_engine::playback::AutoplayProvider;
use encore_engine::resolver::{ResolverError, TrackResolver};
use encore_engine::{Capabilities, EngineConfig, PlaybackOrchestrator, QueueSnapshot, Requester, Track};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};

/// One recorded AudioSink call
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Bind(VoiceTarget),
    Play(String),
    SetVolume(ResourceId, f32),
    Pause(ResourceId),
    Resume(ResourceId),
    Seek(ResourceId, u64),
    Stop(ResourceId),
    Release(VoiceTarget),
}

pub struct MockAudioSink {
    events: SinkEventSender,
    next_id: AtomicU64,
    calls: Mutex<Vec<SinkCall>>,
    /// Live resources: resource -> (tenant, reference)
    active: Mutex<HashMap<ResourceId, (TenantId, String)>>,
    failing: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    seek_supported: AtomicBool,
    bind_fails: AtomicBool,
}

impl MockAudioSink {
    pub fn new(events: SinkEventSender) -> Self {
        Self {
            events,
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            gate: Mutex::new(None),
            seek_supported: AtomicBool::new(true),
            bind_fails: AtomicBool::new(false),
        }
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Make `play` fail with a resolution error for this reference
    pub fn fail_reference(&self, reference: &str) {
        self.failing.lock().unwrap().insert(reference.to_string());
    }

    /// Hold every `play` until a permit is added to the returned semaphore
    pub fn gate_plays(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_seek_supported(&self, supported: bool) {
        self.seek_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_bind_fails(&self, fails: bool) {
        self.bind_fails.store(fails, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// References passed to `play`, in call order
    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Play(reference) => Some(reference),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&SinkCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    /// Live resource currently playing `reference`
    pub fn resource_for(&self, reference: &str) -> Option<ResourceId> {
        self.active
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (_, r))| r == reference)
            .map(|(id, _)| *id)
            .max_by_key(|id| id.0)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Report a natural end of the resource playing `reference`
    pub fn finish(&self, reference: &str) -> ResourceId {
        let resource = self
            .resource_for(reference)
            .unwrap_or_else(|| panic!("{} is not playing", reference));
        let (tenant_id, _) = self.active.lock().unwrap().remove(&resource).unwrap();
        self.events.send(SinkEvent::finished(tenant_id, resource)).unwrap();
        resource
    }

    /// Report an unrecoverable error on the resource playing `reference`
    pub fn error(&self, reference: &str, reason: &str) -> ResourceId {
        let resource = self
            .resource_for(reference)
            .unwrap_or_else(|| panic!("{} is not playing", reference));
        let tenant_id = self.active.lock().unwrap()[&resource].0.clone();
        self.events
            .send(SinkEvent::errored(tenant_id, resource, reason))
            .unwrap();
        resource
    }
}

#[async_trait]
impl AudioSink for MockAudioSink {
    async fn bind(&self, tenant_id: &TenantId, target: &VoiceTarget) -> Result<Connection, SinkError> {
        self.record(SinkCall::Bind(target.clone()));
        if self.bind_fails.load(Ordering::SeqCst) {
            return Err(SinkError::Transport("endpoint unavailable".to_string()));
        }
        Ok(Connection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tenant_id: tenant_id.clone(),
            voice_target: target.clone(),
        })
    }

    async fn play(&self, connection: &Connection, track: &Track) -> Result<ResourceId, SinkError> {
        self.record(SinkCall::Play(track.reference().to_string()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.failing.lock().unwrap().contains(track.reference()) {
            return Err(SinkError::Resolution(format!("{} is unavailable", track.reference())));
        }

        let resource = ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.active.lock().unwrap().insert(
            resource,
            (connection.tenant_id.clone(), track.reference().to_string()),
        );
        let _ = self
            .events
            .send(SinkEvent::started(connection.tenant_id.clone(), resource));
        Ok(resource)
    }

    async fn set_volume(&self, resource: ResourceId, gain: f32) -> Result<(), SinkError> {
        self.record(SinkCall::SetVolume(resource, gain));
        Ok(())
    }

    async fn pause(&self, resource: ResourceId) -> Result<(), SinkError> {
        self.record(SinkCall::Pause(resource));
        Ok(())
    }

    async fn resume(&self, resource: ResourceId) -> Result<(), SinkError> {
        self.record(SinkCall::Resume(resource));
        Ok(())
    }

    async fn seek(&self, resource: ResourceId, position_secs: u64) -> Result<(), SinkError> {
        if !self.seek_supported.load(Ordering::SeqCst) {
            return Err(SinkError::Unsupported("seek"));
        }
        self.record(SinkCall::Seek(resource, position_secs));
        Ok(())
    }

    async fn stop(&self, resource: ResourceId) -> Result<(), SinkError> {
        self.record(SinkCall::Stop(resource));
        self.active.lock().unwrap().remove(&resource);
        Ok(())
    }

    async fn release(&self, connection: Connection) -> Result<(), SinkError> {
        self.record(SinkCall::Release(connection.voice_target));
        Ok(())
    }
}

/// Resolver with a fixed catalog
#[derive(Default)]
pub struct MockResolver {
    catalog: Mutex<HashMap<String, Track>>,
}

impl MockResolver {
    pub fn add(&self, track: Track) {
        self.catalog
            .lock()
            .unwrap()
            .insert(track.reference().to_string(), track);
    }
}

#[async_trait]
impl TrackResolver for MockResolver {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolverError> {
        Ok((1..=limit)
            .map(|i| {
                Track::new(format!("search:{}:{}", query, i), format!("{} {}", query, i), Requester::Autoplay)
                    .with_duration(200)
            })
            .collect())
    }

    async fn resolve_direct(&self, reference: &str) -> Result<Track, ResolverError> {
        self.catalog
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| ResolverError::NotFound(reference.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(TextTarget, NotificationKind, String)>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|(_, k, _)| *k).collect()
    }

    pub fn sent(&self) -> Vec<(TextTarget, NotificationKind, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, target: &TextTarget, kind: NotificationKind, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), kind, message.to_string()));
        Ok(())
    }
}

/// Autoplay provider returning queued batches, then nothing
#[derive(Default)]
pub struct ScriptedAutoplay {
    batches: Mutex<VecDeque<Vec<Track>>>,
    calls: AtomicUsize,
    answered: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedAutoplay {
    pub fn push(&self, batch: Vec<Track>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    /// Sleep this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Hold each proposal until the test adds a permit
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Proposals that ran to completion
    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AutoplayProvider for ScriptedAutoplay {
    async fn propose(&self, _history: &[Track], count: usize) -> Vec<Track> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
        batch.truncate(count);
        self.answered.fetch_add(1, Ordering::SeqCst);
        batch
    }
}

pub struct Harness {
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub sink: Arc<MockAudioSink>,
    pub resolver: Arc<MockResolver>,
    pub notifier: Arc<RecordingNotifier>,
    pub autoplay: Arc<ScriptedAutoplay>,
    pub events: broadcast::Receiver<EncoreEvent>,
}

/// Short timers so idle/vacancy paths are testable
pub fn test_config() -> EngineConfig {
    EngineConfig {
        idle_timeout_secs: 60,
        vacancy_grace_secs: 10,
        progress_interval_ms: 1000,
        autoplay_timeout_ms: 500,
        ..EngineConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let (tx, rx) = sink_event_channel();
    let sink = Arc::new(MockAudioSink::new(tx));
    let resolver = Arc::new(MockResolver::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let autoplay = Arc::new(ScriptedAutoplay::default());

    let caps = Capabilities {
        sink: sink.clone(),
        resolver: resolver.clone(),
        notifier: notifier.clone(),
    };
    let orchestrator = PlaybackOrchestrator::with_autoplay(config, caps, rx, autoplay.clone());
    orchestrator.start().expect("dispatcher starts once");
    let events = orchestrator.subscribe();

    Harness {
        orchestrator,
        sink,
        resolver,
        notifier,
        autoplay,
        events,
    }
}

/// Tenant id plus its voice and text endpoints
pub fn tenant(name: &str) -> (TenantId, VoiceTarget, TextTarget) {
    (
        TenantId::new(name),
        VoiceTarget::new(format!("{}/voice", name)),
        TextTarget::new(format!("{}/text", name)),
    )
}

pub fn track(reference: &str, duration_secs: u64) -> Track {
    Track::new(reference, format!("Title of {}", reference), Requester::user("u1", "Alice"))
        .with_duration(duration_secs)
}

/// Poll `check` until it holds (2s of runtime time)
pub async fn wait_until(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Poll until the tenant's session reports `status`
pub async fn wait_for_status(
    orchestrator: &PlaybackOrchestrator,
    tenant_id: &TenantId,
    status: SessionStatus,
) -> bool {
    for _ in 0..200 {
        if orchestrator.status(tenant_id).await.ok() == Some(status) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll until the tenant's snapshot satisfies `check`
pub async fn wait_for_snapshot(
    orchestrator: &PlaybackOrchestrator,
    tenant_id: &TenantId,
    check: impl Fn(&QueueSnapshot) -> bool,
) -> bool {
    for _ in 0..200 {
        if let Ok(snapshot) = orchestrator.queue_snapshot(tenant_id).await {
            if check(&snapshot) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll until the tenant's queue has `len` tracks
pub async fn wait_for_queue_len(orchestrator: &PlaybackOrchestrator, tenant_id: &TenantId, len: usize) -> bool {
    wait_for_snapshot(orchestrator, tenant_id, |s| s.tracks.len() == len).await
}

/// References of the queued tracks, current first
pub fn references(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.reference().to_string()).collect()
}

/// Poll until the tenant has no session
pub async fn wait_for_destroyed(orchestrator: &PlaybackOrchestrator, tenant_id: &TenantId) -> bool {
    wait_until(|| !orchestrator.has_session(tenant_id)).await
}

/// Drain events already received
pub fn drain(events: &mut broadcast::Receiver<EncoreEvent>) -> Vec<EncoreEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Wait for the tenant's session to be Playing `reference`
pub async fn wait_for_playing(h: &Harness, tenant_id: &TenantId, reference: &str) -> bool {
    for _ in 0..200 {
        let playing = h.sink.resource_for(reference).is_some()
            && h.orchestrator.status(tenant_id).await.ok() == Some(SessionStatus::Playing)
            && h
                .orchestrator
                .queue_snapshot(tenant_id)
                .await
                .ok()
                .and_then(|s| s.tracks.first().map(|t| t.reference() == reference))
                .unwrap_or(false);
        if playing {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
