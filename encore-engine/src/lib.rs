//! # Encore Playback Engine
//!
//! Concurrent per-tenant playback sessions: queue, play/pause/skip/loop,
//! autoplay backfill, idle teardown and progress reporting.
//!
//! **Architecture:**
//! - `track`: Track model
//! - `audio`, `resolver`, `notify`: capability traits the engine drives
//! - `playback`: clock, queue, timers, sessions, registry, autoplay planner
//!   and the PlaybackOrchestrator entry point
//! - `permissions`: command-layer authorization helper
//! - `config`: engine configuration
//!
//! The engine owns no audio I/O; callers inject an [`audio::AudioSink`],
//! a [`resolver::TrackResolver`] and a [`notify::NotificationSink`].

pub mod audio;
pub mod config;
pub mod error;
pub mod notify;
pub mod permissions;
pub mod playback;
pub mod resolver;
pub mod track;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use playback::{Capabilities, PlaybackOrchestrator, QueueSnapshot};
pub use track::{Requester, SourceInfo, Track};
