//! Worker error types.

use thiserror::Error;

/// Errors that abort the current run. LLM failures never reach this type:
/// they are absorbed by the per-trigger retry loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Internal API failure.
    #[error("backend error: {0}")]
    Backend(#[from] backend_client::BackendError),

    /// LLM failure outside the per-trigger retry loop (summarization).
    #[error("llm error: {0}")]
    Llm(#[from] llm::LlmError),

    /// Serialization failure while building a memory snapshot.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
