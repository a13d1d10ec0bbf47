//! # Encore Common Library
//!
//! Shared code for the Encore playback engine and its callers:
//! - Tenant and endpoint identifiers
//! - Event types (EncoreEvent enum) and the EventBus
//! - Configuration file resolution
//! - Common error type
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
pub use ids::{TenantId, TextTarget, VoiceTarget};
