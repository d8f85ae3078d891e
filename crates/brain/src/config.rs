//! Worker configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Turn worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Nudge endpoint bind address.
    pub addr: SocketAddr,
    /// API service base URL (internal surface).
    pub backend_api_url: String,
    /// Pre-shared key for the internal surface.
    pub brain_api_key: String,
    /// 32-byte secret for token decryption.
    pub encrypt_secret: String,
    /// LLM provider base URL (OpenAI-compatible).
    pub llm_api_url: String,
    /// Deadline for each LLM request.
    pub llm_timeout: Duration,
    /// Model used when an agent has none configured.
    pub default_model: String,
    /// Total LLM attempts per trigger (including the first).
    pub max_retries: u32,
    /// Short-term history window cap.
    pub history_window: i64,
    /// Short-term history window floor.
    pub min_window: i64,
    /// Messages sent by an agent before its memory is summarized.
    pub summary_threshold: i64,
    /// Messages condensed per summarization.
    pub summary_window: i64,
    /// Maximum accepted reply body length.
    pub max_message_length: usize,
    /// Turns per run before the loop bails out.
    pub max_iterations: u32,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BRAIN_BIND_ADDR` | Nudge endpoint bind address | `127.0.0.1:8788` |
    /// | `BACKEND_API_URL` | API service base URL | (required) |
    /// | `BRAIN_API_KEY` | Internal pre-shared key | (required) |
    /// | `ENCRYPT_SECRET` | 32-byte token decryption key | (required) |
    /// | `LLM_API_URL` | LLM provider base URL | `https://api.openai.com` |
    /// | `LLM_TIMEOUT_SECS` | LLM request deadline | `60` |
    /// | `DEFAULT_MODEL` | Fallback model | `gpt-4o` |
    /// | `MAX_RETRIES` | LLM attempts per trigger | `3` |
    /// | `HISTORY_WINDOW` | History window cap | `14` |
    /// | `MIN_WINDOW` | History window floor | `5` |
    /// | `SUMMARY_THRESHOLD` | Messages before summarization | `10` |
    /// | `SUMMARY_WINDOW` | Messages per summary | `20` |
    /// | `MAX_MESSAGE_LENGTH` | Reply body cap | `2000` |
    /// | `MAX_ITERATIONS` | Turns per run | `100` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("BRAIN_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8788".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let backend_api_url =
            env::var("BACKEND_API_URL").map_err(|_| ConfigError::Missing("BACKEND_API_URL"))?;
        let brain_api_key =
            env::var("BRAIN_API_KEY").map_err(|_| ConfigError::Missing("BRAIN_API_KEY"))?;
        let encrypt_secret =
            env::var("ENCRYPT_SECRET").map_err(|_| ConfigError::Missing("ENCRYPT_SECRET"))?;

        let llm_api_url =
            env::var("LLM_API_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());

        Ok(Self {
            addr,
            backend_api_url,
            brain_api_key,
            encrypt_secret,
            llm_api_url,
            llm_timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 60)?),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            max_retries: parse_var("MAX_RETRIES", 3)?,
            history_window: parse_var("HISTORY_WINDOW", 14)?,
            min_window: parse_var("MIN_WINDOW", 5)?,
            summary_threshold: parse_var("SUMMARY_THRESHOLD", 10)?,
            summary_window: parse_var("SUMMARY_WINDOW", 20)?,
            max_message_length: parse_var("MAX_MESSAGE_LENGTH", 2000)?,
            max_iterations: parse_var("MAX_ITERATIONS", 100)?,
        })
    }

    /// History window for an agent: grows with its message count, clamped
    /// to [`min_window`, `history_window`].
    pub fn history_fetch_count(&self, message_count: i64) -> i64 {
        message_count.max(self.min_window).min(self.history_window)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BRAIN_BIND_ADDR format")]
    InvalidAddr,

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{0} environment variable is malformed")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_window(min: i64, max: i64) -> WorkerConfig {
        WorkerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            backend_api_url: String::new(),
            brain_api_key: String::new(),
            encrypt_secret: String::new(),
            llm_api_url: String::new(),
            llm_timeout: Duration::from_secs(60),
            default_model: "gpt-4o".to_string(),
            max_retries: 3,
            history_window: max,
            min_window: min,
            summary_threshold: 10,
            summary_window: 20,
            max_message_length: 2000,
            max_iterations: 100,
        }
    }

    #[test]
    fn test_history_fetch_count_clamps() {
        let config = config_with_window(5, 14);
        assert_eq!(config.history_fetch_count(0), 5);
        assert_eq!(config.history_fetch_count(7), 7);
        assert_eq!(config.history_fetch_count(100), 14);
    }
}
