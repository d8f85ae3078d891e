//! Typed client for the internal API surface.
//!
//! The turn worker and the watchdog talk to the API service exclusively
//! through this client. Every request carries the pre-shared
//! `X-Brain-Api-Key` header; the operation set mirrors the internal
//! routing namespace one-to-one.
//!
//! # Example
//!
//! ```no_run
//! use backend_client::BackendClient;
//!
//! # async fn example() -> Result<(), backend_client::BackendError> {
//! let client = BackendClient::new("http://127.0.0.1:8787", "preshared-key")?;
//! let flags = client.project_flags(7).await?;
//! if flags.paused {
//!     return Ok(());
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use database::context::ProjectContext;
use database::message::PendingAge;
use database::models::{AgentSummary, Message, MessageStatus};
use database::project::{ActiveProject, DecrementOutcome, ProjectFlags};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header carrying the pre-shared internal key.
pub const INTERNAL_KEY_HEADER: &str = "X-Brain-Api-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from internal API calls.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("internal API rejected the pre-shared key")]
    Unauthorized,

    #[error("internal API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed internal API response: {0}")]
    Decode(String),
}

/// Result type for internal API calls.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Body for `create_agent_message`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgentMessage {
    pub conversation_id: i64,
    pub project_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: MessageStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogBody<'a> {
    project_id: Option<i64>,
    level: &'a str,
    code: Option<&'a str>,
    message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryBody<'a> {
    summary: &'a str,
    history_json: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PauseBody<'a> {
    code: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountResponse {
    message_count: i64,
}

/// Client for the internal REST surface.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    /// Create a client against the API service's base URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/api/internal{}",
            self.base_url.trim_end_matches('/'),
            path
        );
        self.http
            .request(method, url)
            .header(INTERNAL_KEY_HEADER, &self.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Atomic project snapshot for one run.
    pub async fn get_context(&self, project_id: i64) -> Result<ProjectContext> {
        self.send(self.request(Method::GET, &format!("/projects/{}/context", project_id)))
            .await
    }

    /// Pending messages, oldest first.
    pub async fn pending_queue(&self, project_id: i64) -> Result<Vec<Message>> {
        self.send(self.request(Method::GET, &format!("/projects/{}/pending", project_id)))
            .await
    }

    /// Insert an assistant reply (status `pending`).
    pub async fn create_agent_message(&self, message: &NewAgentMessage) -> Result<Message> {
        self.send(self.request(Method::POST, "/messages").json(message))
            .await
    }

    /// Transition a message's status.
    pub async fn update_message_status(&self, id: i64, status: MessageStatus) -> Result<Message> {
        self.send(
            self.request(Method::PATCH, &format!("/messages/{}/status", id))
                .json(&StatusBody { status }),
        )
        .await
    }

    /// Append a persistent log entry.
    pub async fn create_log(
        &self,
        project_id: Option<i64>,
        level: &str,
        code: Option<&str>,
        message: &str,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .send(self.request(Method::POST, "/logs").json(&LogBody {
                project_id,
                level,
                code,
                message,
            }))
            .await?;
        Ok(())
    }

    /// Replace the memory summary for (project, agent).
    pub async fn upsert_summary(
        &self,
        project_id: i64,
        agent_id: i64,
        summary: &str,
        history_json: Option<&str>,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .send(
                self.request(
                    Method::PUT,
                    &format!("/projects/{}/summaries/{}", project_id, agent_id),
                )
                .json(&SummaryBody {
                    summary,
                    history_json,
                }),
            )
            .await?;
        Ok(())
    }

    /// The summary row for (project, agent), if any.
    pub async fn get_summary(
        &self,
        project_id: i64,
        agent_id: i64,
    ) -> Result<Option<AgentSummary>> {
        self.send(self.request(
            Method::GET,
            &format!("/projects/{}/summaries/{}", project_id, agent_id),
        ))
        .await
    }

    /// All summary rows of a project.
    pub async fn list_summaries(&self, project_id: i64) -> Result<Vec<AgentSummary>> {
        self.send(self.request(Method::GET, &format!("/projects/{}/summaries", project_id)))
            .await
    }

    /// Atomic budget decrement (pauses the project at zero).
    pub async fn decrement_limit(&self, project_id: i64) -> Result<DecrementOutcome> {
        self.send(self.request(
            Method::POST,
            &format!("/projects/{}/limit/decrement", project_id),
        ))
        .await
    }

    /// Count one more message for (project, agent); returns the new count.
    pub async fn increment_agent_count(&self, project_id: i64, agent_id: i64) -> Result<i64> {
        let response: CountResponse = self
            .send(self.request(
                Method::POST,
                &format!("/projects/{}/agents/{}/count", project_id, agent_id),
            ))
            .await?;
        Ok(response.message_count)
    }

    /// Cheap per-iteration worker flags.
    pub async fn project_flags(&self, project_id: i64) -> Result<ProjectFlags> {
        self.send(self.request(Method::GET, &format!("/projects/{}/flags", project_id)))
            .await
    }

    /// Last `limit` sent user/assistant messages involving an agent,
    /// newest first.
    pub async fn recent_agent_messages(
        &self,
        project_id: i64,
        agent_id: i64,
        limit: i64,
    ) -> Result<Vec<Message>> {
        self.send(self.request(
            Method::GET,
            &format!(
                "/projects/{}/agents/{}/recent?limit={}",
                project_id, agent_id, limit
            ),
        ))
        .await
    }

    /// All unpaused projects with idle ages (watchdog).
    pub async fn active_projects(&self) -> Result<Vec<ActiveProject>> {
        self.send(self.request(Method::GET, "/projects/active")).await
    }

    /// Oldest pending message of a project with its age (watchdog).
    pub async fn oldest_pending(&self, project_id: i64) -> Result<Option<PendingAge>> {
        self.send(self.request(
            Method::GET,
            &format!("/projects/{}/oldest-pending", project_id),
        ))
        .await
    }

    /// Pause a project with a machine code (idempotent).
    pub async fn pause_project(&self, project_id: i64, code: &str, message: &str) -> Result<()> {
        let _: serde_json::Value = self
            .send(
                self.request(Method::POST, &format!("/projects/{}/pause", project_id))
                    .json(&PauseBody { code, message }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_wire_shapes() {
        let message = NewAgentMessage {
            conversation_id: 1,
            project_id: 2,
            sender_id: 3,
            receiver_id: 4,
            content: "hi".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["conversationId"], 1);
        assert_eq!(json["senderId"], 3);

        let status = StatusBody {
            status: MessageStatus::Failed,
        };
        assert_eq!(serde_json::to_value(&status).unwrap()["status"], "failed");
    }

    #[test]
    fn test_base_url_normalization() {
        let client = BackendClient::new("http://localhost:8787/", "k").unwrap();
        let request = client
            .request(Method::GET, "/projects/1/flags")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:8787/api/internal/projects/1/flags"
        );
        assert!(request.headers().contains_key(INTERNAL_KEY_HEADER));
    }
}
