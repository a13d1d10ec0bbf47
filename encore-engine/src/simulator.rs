//! In-process capabilities for running the engine without a chat platform
//!
//! SimulatedSink "plays" a track by sleeping for its duration divided by the
//! speed factor, then reports Finished. References containing `broken` fail
//! to resolve, which exercises the drop-and-advance path.

use async_trait::async_trait;
use dashmap::DashMap;
use encore_common::{TenantId, TextTarget, VoiceTarget};
use encore_engine::audio::{AudioSink, Connection, ResourceId, SinkError, SinkEvent, SinkEventSender};
use encore_engine::notify::{NotificationKind, NotificationSink, NotifyError};
use encore_engine::resolver::{ResolverError, TrackResolver};
use encore_engine::{Requester, SourceInfo, Track};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// Assumed length of tracks without a known duration
const DEFAULT_TRACK_SECS: u64 = 180;

pub struct SimulatedSink {
    events: SinkEventSender,
    speed: f64,
    next_id: AtomicU64,
    /// Completion timers of active resources
    active: DashMap<ResourceId, (TenantId, JoinHandle<()>)>,
}

impl SimulatedSink {
    pub fn new(events: SinkEventSender, speed: f64) -> Self {
        Self {
            events,
            speed: speed.max(0.001),
            next_id: AtomicU64::new(1),
            active: DashMap::new(),
        }
    }

    fn finish(&self, resource: ResourceId) {
        if let Some((_, (tenant_id, handle))) = self.active.remove(&resource) {
            handle.abort();
            let _ = self.events.send(SinkEvent::finished(tenant_id, resource));
        }
    }
}

#[async_trait]
impl AudioSink for SimulatedSink {
    async fn bind(&self, tenant_id: &TenantId, target: &VoiceTarget) -> Result<Connection, SinkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Simulated bind of {} for {}", target, tenant_id);
        Ok(Connection {
            id,
            tenant_id: tenant_id.clone(),
            voice_target: target.clone(),
        })
    }

    async fn play(&self, connection: &Connection, track: &Track) -> Result<ResourceId, SinkError> {
        // Resolution latency
        sleep(Duration::from_millis(20)).await;
        if track.reference().contains("broken") {
            return Err(SinkError::Resolution(format!("cannot stream {}", track.reference())));
        }

        let resource = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let secs = track.duration_secs().unwrap_or(DEFAULT_TRACK_SECS) as f64 / self.speed;
        let tenant_id = connection.tenant_id.clone();
        let events = self.events.clone();

        let _ = events.send(SinkEvent::started(tenant_id.clone(), resource));
        let finisher = {
            let tenant_id = tenant_id.clone();
            tokio::spawn(async move {
                sleep(Duration::from_secs_f64(secs)).await;
                let _ = events.send(SinkEvent::finished(tenant_id, resource));
            })
        };
        self.active.insert(resource, (tenant_id, finisher));
        Ok(resource)
    }

    async fn set_volume(&self, resource: ResourceId, gain: f32) -> Result<(), SinkError> {
        debug!("Simulated gain {:.2} on {}", gain, resource);
        Ok(())
    }

    async fn pause(&self, resource: ResourceId) -> Result<(), SinkError> {
        debug!("Simulated pause of {}", resource);
        Ok(())
    }

    async fn resume(&self, resource: ResourceId) -> Result<(), SinkError> {
        debug!("Simulated resume of {}", resource);
        Ok(())
    }

    async fn seek(&self, resource: ResourceId, position_secs: u64) -> Result<(), SinkError> {
        debug!("Simulated seek of {} to {}s", resource, position_secs);
        Ok(())
    }

    async fn stop(&self, resource: ResourceId) -> Result<(), SinkError> {
        self.finish(resource);
        Ok(())
    }

    async fn release(&self, connection: Connection) -> Result<(), SinkError> {
        debug!("Simulated release of {} for {}", connection.voice_target, connection.tenant_id);
        Ok(())
    }
}

/// Resolver inventing plausible tracks for any query
pub struct SyntheticResolver;

impl SyntheticResolver {
    fn invent(reference: &str, title: &str) -> Track {
        let duration = rand::thread_rng().gen_range(120..=300);
        Track::new(reference, title, Requester::Autoplay)
            .with_duration(duration)
            .with_source(SourceInfo {
                provider: "synthetic".to_string(),
                entry_id: Some(reference.to_string()),
                uploader: None,
            })
    }
}

#[async_trait]
impl TrackResolver for SyntheticResolver {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolverError> {
        let slug = query.to_lowercase().replace(' ', "-");
        Ok((1..=limit)
            .map(|i| Self::invent(&format!("sim://{}/{}", slug, i), &format!("{} (take {})", query, i)))
            .collect())
    }

    async fn resolve_direct(&self, reference: &str) -> Result<Track, ResolverError> {
        if reference.is_empty() {
            return Err(ResolverError::NotFound(reference.to_string()));
        }
        Ok(Self::invent(reference, reference))
    }
}

/// Notifications go to the log
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, target: &TextTarget, kind: NotificationKind, message: &str) -> Result<(), NotifyError> {
        info!("[{}] {:?}: {}", target, kind, message);
        Ok(())
    }
}
