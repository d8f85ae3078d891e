//! LLM client error types.

use thiserror::Error;

/// Errors from a chat-completion call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The provider rejected the API key.
    #[error("invalid API key")]
    Auth,

    /// The provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Any other non-success response.
    #[error("provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not contain a usable completion.
    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether the failure is transport-level (retried like a format
    /// failure by the worker) rather than a configuration problem.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LlmError::Network(_) | LlmError::Timeout | LlmError::RateLimited | LlmError::Api { .. }
        )
    }
}
