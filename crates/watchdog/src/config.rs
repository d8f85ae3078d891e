//! Watchdog configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Watchdog configuration.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// API service base URL (internal surface).
    pub backend_api_url: String,
    /// Pre-shared key for the internal surface.
    pub brain_api_key: String,
    /// Time between scans.
    pub interval: Duration,
    /// Age after which a stuck pending message pauses the project.
    pub stall_timeout: Duration,
    /// Inactivity after which a project pauses.
    pub idle_timeout: Duration,
}

impl WatchdogConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BACKEND_API_URL` | API service base URL | (required) |
    /// | `BRAIN_API_KEY` | Internal pre-shared key | (required) |
    /// | `WATCHDOG_INTERVAL_SECS` | Time between scans | `30` |
    /// | `STALL_TIMEOUT_SECS` | Stuck-pending threshold | `90` |
    /// | `IDLE_TIMEOUT_SECS` | Inactivity threshold | `90` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_api_url =
            env::var("BACKEND_API_URL").map_err(|_| ConfigError::Missing("BACKEND_API_URL"))?;
        let brain_api_key =
            env::var("BRAIN_API_KEY").map_err(|_| ConfigError::Missing("BRAIN_API_KEY"))?;

        Ok(Self {
            backend_api_url,
            brain_api_key,
            interval: Duration::from_secs(parse_var("WATCHDOG_INTERVAL_SECS", 30)?),
            stall_timeout: Duration::from_secs(parse_var("STALL_TIMEOUT_SECS", 90)?),
            idle_timeout: Duration::from_secs(parse_var("IDLE_TIMEOUT_SECS", 90)?),
        })
    }
}

fn parse_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{0} environment variable is malformed")]
    Invalid(&'static str),
}
