//! Chat-completion client seam for Parley.
//!
//! This crate defines the [`ChatCompleter`] trait the turn worker talks
//! through, plus two implementations:
//!
//! - [`OpenAiChat`] - an OpenAI-compatible chat-completions client with
//!   JSON-schema response enforcement and a deterministic request timeout.
//! - [`MockChat`] - a scripted completer for tests.
//!
//! # Example
//!
//! ```
//! use llm::{ChatMessage, ChatRequest, MockChat};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use llm::ChatCompleter;
//!
//! let mock = MockChat::new();
//! mock.push_reply(r#"{"recipientId": 2, "body": "hi"}"#);
//!
//! let request = ChatRequest::new("gpt-4o", vec![ChatMessage::user("hello")]);
//! let reply = mock.complete("sk-test", request).await.unwrap();
//! assert!(reply.contains("recipientId"));
//! # }
//! ```

mod error;
mod mock;
mod openai;
mod types;

pub use error::LlmError;
pub use mock::MockChat;
pub use openai::OpenAiChat;
pub use types::{ChatMessage, ChatRequest};

// Re-export async_trait for implementors.
pub use async_trait::async_trait;

/// The seam between the turn worker and an LLM provider.
///
/// The API key is passed per call because each project carries its own
/// decrypted token.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Run one chat completion and return the raw assistant content.
    async fn complete(&self, api_key: &str, request: ChatRequest) -> Result<String, LlmError>;
}
