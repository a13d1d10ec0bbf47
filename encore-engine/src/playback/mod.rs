//! Playback core: sessions, queue, clock, timers, autoplay and the
//! orchestrator that drives them

pub mod autoplay;
pub mod clock;
pub mod queue;
pub mod registry;
pub mod session;
pub mod timers;

mod orchestrator;

pub use autoplay::{AutoplayPlanner, AutoplayProvider};
pub use orchestrator::{Capabilities, PlaybackOrchestrator, QueueSnapshot};
pub use registry::SessionRegistry;
pub use session::{Session, SessionSettings};
