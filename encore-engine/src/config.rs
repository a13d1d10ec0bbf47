//! Configuration for the Encore playback engine
//!
//! Loaded once at startup from a TOML file (see
//! `encore_common::config::resolve_config_path` for where the file is looked
//! up). Every key is optional; missing keys take the built-in defaults below.
//!
//! ```toml
//! max_queue_size = 100
//! default_volume = 50
//! idle_timeout_secs = 300
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{Error, Result};
use encore_common::time::{millis_to_duration, secs_to_duration};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Upper bound for `max_volume`; maps to AudioSink gain 2.0
pub const VOLUME_CEILING: u16 = 200;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum queue length; enqueue beyond this fails with QueueFull
    pub max_queue_size: usize,

    /// Volume given to new sessions (0 - max_volume)
    pub default_volume: u16,

    /// Upper bound accepted by set_volume
    pub max_volume: u16,

    /// Grace period before an idle, empty, non-sticky session is destroyed
    pub idle_timeout_secs: u64,

    /// Grace period after every human left the voice endpoint
    pub vacancy_grace_secs: u64,

    /// Progress ticker period
    pub progress_interval_ms: u64,

    /// Bound on a single autoplay proposal
    pub autoplay_timeout_ms: u64,

    /// Tracks requested per autoplay fill
    pub autoplay_batch_size: usize,

    /// Completed tracks remembered for autoplay context
    pub history_capacity: usize,

    /// Lifetime of cached autoplay proposals per seed track
    pub autoplay_cache_ttl_secs: u64,

    /// Broadcast capacity of the engine EventBus
    pub event_bus_capacity: usize,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            default_volume: 50,
            max_volume: 200,
            idle_timeout_secs: 300,
            vacancy_grace_secs: 30,
            progress_interval_ms: 5000,
            autoplay_timeout_ms: 5000,
            autoplay_batch_size: 3,
            history_capacity: 10,
            autoplay_cache_ttl_secs: 3600,
            event_bus_capacity: 256,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the resolved config file, falling back to defaults
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config: Self = encore_common::config::load_or_default(cli_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_volume > VOLUME_CEILING {
            return Err(Error::Config(format!(
                "max_volume {} exceeds {} (gain 2.0)",
                self.max_volume, VOLUME_CEILING
            )));
        }
        if self.max_queue_size == 0 {
            return Err(Error::Config("max_queue_size must be at least 1".to_string()));
        }
        if self.default_volume > self.max_volume {
            return Err(Error::Config(format!(
                "default_volume {} exceeds max_volume {}",
                self.default_volume, self.max_volume
            )));
        }
        if self.progress_interval_ms == 0 {
            return Err(Error::Config("progress_interval_ms must be positive".to_string()));
        }
        if self.history_capacity == 0 {
            return Err(Error::Config("history_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        secs_to_duration(self.idle_timeout_secs)
    }

    pub fn vacancy_grace(&self) -> Duration {
        secs_to_duration(self.vacancy_grace_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        millis_to_duration(self.progress_interval_ms)
    }

    pub fn autoplay_timeout(&self) -> Duration {
        millis_to_duration(self.autoplay_timeout_ms)
    }

    pub fn autoplay_cache_ttl(&self) -> Duration {
        secs_to_duration(self.autoplay_cache_ttl_secs)
    }
}
