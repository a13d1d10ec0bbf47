//! Configuration file resolution and loading
//!
//! Resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config dir>/encore/config.toml`)
//! 4. None: caller falls back to compiled defaults

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ENCORE_CONFIG";

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolve the config file path following the priority order above
///
/// Returns `None` when no source names a file; the per-user file is only
/// returned when it exists.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
) -> Option<(PathBuf, ConfigSource)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    // Priority 3: Per-user config file
    default_config_file()
        .filter(|p| p.exists())
        .map(|p| (p, ConfigSource::UserConfigDir))
}

/// Get default configuration file path for the platform
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("encore").join("config.toml"))
}

/// Parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str::<T>(&content)?;
    Ok(parsed)
}

/// Load `T` from the resolved config file, or defaults when there is none
///
/// A missing file yields a warning and defaults. A file that exists but
/// fails to parse is an error.
pub fn load_or_default<T>(cli_arg: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some((path, source)) = resolve_config_path(cli_arg, CONFIG_ENV_VAR) else {
        info!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} ({:?}) does not exist, using compiled defaults",
            path.display(),
            source
        );
        return Ok(T::default());
    }

    info!("Loading config from {} ({:?})", path.display(), source);
    load_toml(&path).map_err(|e| match e {
        Error::Parse(parse) => Error::Config(format!("{}: {}", path.display(), parse)),
        other => other,
    })
}
