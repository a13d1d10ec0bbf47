//! Playback orchestrator
//!
//! **Module Structure:**
//! - `core.rs`: construction, sink event dispatch, start/advance loop,
//!   timers, teardown
//! - `queue.rs`: queue mutations (enqueue, remove, shuffle, stop)
//! - `playback.rs`: transport control and session settings (skip, pause,
//!   resume, seek, volume, loop, autoplay, sticky) plus endpoint signals
//! - `diagnostics.rs`: status and snapshot queries

mod core;
mod diagnostics;
mod playback;
mod queue;

pub use self::core::{Capabilities, PlaybackOrchestrator};
pub use self::diagnostics::QueueSnapshot;
