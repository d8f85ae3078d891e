//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// API service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Session cookie signing key.
    pub session_key: String,
    /// 32-byte secret for token encryption.
    pub encrypt_secret: String,
    /// Pre-shared key for the internal surface.
    pub brain_api_key: String,
    /// Turn worker base URL; nudges are disabled when unset.
    pub brain_url: Option<String>,
    /// Maximum accepted message content length.
    pub max_message_length: usize,
    /// Recent-message window handed to the worker context snapshot.
    pub context_window: i64,
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
    /// Demo account whose budget settings are capped.
    pub demo_user_id: Option<i64>,
    /// Token that cannot be deleted or disabled.
    pub demo_token_id: Option<i64>,
    /// Read-only demo projects.
    pub demo_project_ids: Vec<i64>,
    /// Read-only snapshot project.
    pub snapshot_project_id: Option<i64>,
    /// Budget ceiling for the demo user.
    pub demo_message_limit: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BIND_ADDR` | Server bind address | `127.0.0.1:8787` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:parley.db?mode=rwc` |
    /// | `SESSION_KEY` | Session signing key | (required) |
    /// | `ENCRYPT_SECRET` | 32-byte token encryption key | (required) |
    /// | `BRAIN_API_KEY` | Internal pre-shared key | (required) |
    /// | `BRAIN_URL` | Worker base URL | (nudges disabled) |
    /// | `MAX_MESSAGE_LENGTH` | Message content cap | `2000` |
    /// | `CONTEXT_WINDOW` | Snapshot message window | `50` |
    /// | `SESSION_TTL_SECS` | Session lifetime | `604800` |
    /// | `DEMO_USER_ID` | Capped demo user | (none) |
    /// | `DEMO_TOKEN_ID` | Protected demo token | (none) |
    /// | `DEMO_PROJECT_IDS` | Comma-separated read-only projects | (none) |
    /// | `SNAPSHOT_PROJECT_ID` | Read-only snapshot project | (none) |
    /// | `DEMO_MESSAGE_LIMIT` | Demo budget ceiling | `50` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:parley.db?mode=rwc".to_string());

        let session_key =
            env::var("SESSION_KEY").map_err(|_| ConfigError::Missing("SESSION_KEY"))?;
        let encrypt_secret =
            env::var("ENCRYPT_SECRET").map_err(|_| ConfigError::Missing("ENCRYPT_SECRET"))?;
        let brain_api_key =
            env::var("BRAIN_API_KEY").map_err(|_| ConfigError::Missing("BRAIN_API_KEY"))?;

        let brain_url = env::var("BRAIN_URL").ok().filter(|v| !v.is_empty());

        Ok(Self {
            addr,
            database_url,
            session_key,
            encrypt_secret,
            brain_api_key,
            brain_url,
            max_message_length: parse_var("MAX_MESSAGE_LENGTH", 2000)?,
            context_window: parse_var("CONTEXT_WINDOW", 50)?,
            session_ttl_secs: parse_var("SESSION_TTL_SECS", 7 * 24 * 3600)?,
            demo_user_id: parse_optional("DEMO_USER_ID")?,
            demo_token_id: parse_optional("DEMO_TOKEN_ID")?,
            demo_project_ids: parse_id_list("DEMO_PROJECT_IDS")?,
            snapshot_project_id: parse_optional("SNAPSHOT_PROJECT_ID")?,
            demo_message_limit: parse_var("DEMO_MESSAGE_LIMIT", 50)?,
        })
    }

    /// Whether a project id is demo/snapshot protected (read-only).
    pub fn is_protected_project(&self, project_id: i64) -> bool {
        self.demo_project_ids.contains(&project_id)
            || self.snapshot_project_id == Some(project_id)
    }

    /// Whether a token id is the protected demo token.
    pub fn is_protected_token(&self, token_id: i64) -> bool {
        self.demo_token_id == Some(token_id)
    }

    /// Whether a user id is the demo account.
    pub fn is_demo_user(&self, user_id: i64) -> bool {
        self.demo_user_id == Some(user_id)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn parse_optional(name: &'static str) -> Result<Option<i64>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        _ => Ok(None),
    }
}

fn parse_id_list(name: &'static str) -> Result<Vec<i64>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .split(',')
            .map(|part| part.trim().parse().map_err(|_| ConfigError::Invalid(name)))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BIND_ADDR format")]
    InvalidAddr,

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{0} environment variable is malformed")]
    Invalid(&'static str),
}
