//! Encore engine simulator - Main entry point
//!
//! Runs the playback engine against simulated capabilities: several tenants
//! enqueue tracks concurrently, tracks "play" at an accelerated speed, and
//! every engine event is printed to stdout as one JSON line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use encore_common::events::EncoreEvent;
use encore_common::{TenantId, TextTarget, VoiceTarget};
use encore_engine::audio::sink_event_channel;
use encore_engine::{Capabilities, EngineConfig, PlaybackOrchestrator, Requester, Track};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod simulator;

use simulator::{LogNotifier, SimulatedSink, SyntheticResolver};

/// Command-line arguments for encore-engine
#[derive(Parser, Debug)]
#[command(name = "encore-engine")]
#[command(about = "Playback engine simulator for Encore")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ENCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of simulated tenants
    #[arg(short, long, default_value = "2")]
    tenants: usize,

    /// Tracks enqueued per tenant
    #[arg(long, default_value = "3")]
    tracks: usize,

    /// Playback speed factor (60 plays a 3-minute track in 3 seconds)
    #[arg(short, long, default_value = "60")]
    speed: f64,

    /// Enable autoplay on every session
    #[arg(long)]
    autoplay: bool,

    /// Override the idle timeout (seconds)
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(secs) = args.idle_timeout_secs {
        config.idle_timeout_secs = secs;
    }

    // Initialize tracing (RUST_LOG overrides the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting Encore simulator: {} tenants x {} tracks at {}x speed",
        args.tenants, args.tracks, args.speed
    );

    let (sink_tx, sink_rx) = sink_event_channel();
    let caps = Capabilities {
        sink: Arc::new(SimulatedSink::new(sink_tx, args.speed)),
        resolver: Arc::new(SyntheticResolver),
        notifier: Arc::new(LogNotifier),
    };
    let orchestrator = PlaybackOrchestrator::new(config, caps, sink_rx);
    orchestrator.start().context("Failed to start sink event dispatcher")?;

    let mut events = orchestrator.subscribe();

    for t in 1..=args.tenants {
        let orchestrator = Arc::clone(&orchestrator);
        let tracks = args.tracks;
        let autoplay = args.autoplay;
        tokio::spawn(async move {
            if let Err(e) = run_tenant(orchestrator, t, tracks, autoplay).await {
                error!("Tenant {} failed: {}", t, e);
            }
        });
    }

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut remaining = args.tenants;

    while remaining > 0 {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, disconnecting all sessions");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event).context("Failed to serialize event")?);
                    if matches!(event, EncoreEvent::SessionDestroyed { .. }) {
                        remaining -= 1;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Event printer lagged, {} events dropped", n),
                Err(RecvError::Closed) => break,
            }
        }
    }

    for tenant_id in orchestrator.tenants() {
        orchestrator.disconnect(&tenant_id).await;
    }

    info!("Simulation complete");
    Ok(())
}

/// Enqueue a tenant's tracks; the second track of the first tenant is
/// unplayable so the drop-and-advance path shows up in the output
async fn run_tenant(
    orchestrator: Arc<PlaybackOrchestrator>,
    index: usize,
    tracks: usize,
    autoplay: bool,
) -> encore_engine::Result<()> {
    let tenant_id = TenantId::new(format!("tenant-{}", index));
    let voice = VoiceTarget::new(format!("tenant-{}/voice", index));
    let text = TextTarget::new(format!("tenant-{}/text", index));
    let requester = Requester::user(format!("user-{}", index), format!("Listener {}", index));

    for n in 1..=tracks {
        let reference = if index == 1 && n == 2 {
            format!("sim://tenant-{}/broken-{}", index, n)
        } else {
            format!("sim://tenant-{}/track-{}", index, n)
        };
        let track = Track::new(reference, format!("Tenant {} Song {}", index, n), requester.clone())
            .with_duration(150 + 30 * n as u64);
        orchestrator.enqueue(&tenant_id, &voice, &text, track).await?;
        if n == 1 && autoplay {
            orchestrator.set_autoplay(&tenant_id, true).await?;
        }
    }
    Ok(())
}
