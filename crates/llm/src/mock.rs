//! Scripted mock completer for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::LlmError;
use crate::types::ChatRequest;
use crate::ChatCompleter;

/// A [`ChatCompleter`] that replays scripted replies in order and records
/// every request it sees.
#[derive(Debug, Default)]
pub struct MockChat {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, content: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(content.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Requests seen so far, in call order.
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of completions performed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ChatCompleter for MockChat {
    async fn complete(&self, _api_key: &str, request: ChatRequest) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("mock: no scripted reply".to_string())))
    }
}
