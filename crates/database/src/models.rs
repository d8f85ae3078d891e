//! Database models.
//!
//! All models serialize with camelCase field names, which is the canonical
//! wire form across the REST surfaces and the live-update hub.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered user. Owns agents, tokens and projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Bcrypt verifier. Never leaves the API boundary.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

/// An encrypted LLM API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// AES-256-CBC ciphertext in `iv_hex:data_hex` form. Never serialized
    /// on the user-facing surface.
    #[serde(skip_serializing)]
    pub encrypted_secret: String,
    pub active: bool,
    pub created_at: String,
}

/// A participant agent. `user_id` is `None` only for the global System
/// agent (id 0), which is preseeded by the migration and cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub role: String,
    pub description: String,
    pub model: String,
    pub created_at: String,
}

/// A project: the unit of coordination. Created paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub system_prompt: String,
    pub paused: bool,
    /// Remaining message budget before auto-pause.
    pub message_limit: i64,
    pub token_id: Option<i64>,
    pub created_at: String,
    pub last_activity_at: String,
}

/// A project membership joined with the agent's base definition.
///
/// `role` and `prompt` are the effective values: the per-project override
/// when present, the agent's own role/description otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub project_id: i64,
    pub agent_id: i64,
    pub name: String,
    pub role: String,
    pub prompt: String,
    pub model: String,
    /// Agent ids this member may address. The System agent (id 0) is
    /// always addressable and is not listed here.
    pub can_message: Vec<i64>,
}

/// A pairwise conversation. `sender_id <= receiver_id` always holds; the
/// pair is unique per project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub project_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub created_at: String,
}

/// Message origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    System,
    Error,
}

/// Message delivery state. Rows are append-only; only this field changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub project_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub created_at: String,
}

/// Per-(project, agent) long-term memory summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub project_id: i64,
    pub agent_id: i64,
    pub summary: String,
    /// Optional snapshot of the messages the summary was produced from.
    pub history_json: Option<String>,
    /// Messages sent by the agent since the last summarization.
    pub message_count: i64,
    /// Total number of summarizations performed.
    pub summary_count: i64,
    pub updated_at: String,
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A persisted log entry, visible to the project owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: i64,
    pub project_id: Option<i64>,
    pub level: LogLevel,
    pub code: Option<String>,
    pub message: String,
    pub created_at: String,
}

/// Id of the singleton System agent.
pub const SYSTEM_AGENT_ID: i64 = 0;

/// Normalize an agent pair into conversation order (`sender <= receiver`).
pub fn conversation_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_pair_orders() {
        assert_eq!(conversation_pair(2, 1), (1, 2));
        assert_eq!(conversation_pair(1, 2), (1, 2));
        assert_eq!(conversation_pair(0, 5), (0, 5));
        assert_eq!(conversation_pair(3, 3), (3, 3));
    }

    #[test]
    fn test_message_wire_form_is_camel_case() {
        let message = Message {
            id: 1,
            conversation_id: 2,
            project_id: 3,
            sender_id: 0,
            receiver_id: 4,
            content: "hello".to_string(),
            kind: MessageKind::User,
            status: MessageStatus::Pending,
            created_at: "2026-01-01 00:00:00".to_string(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["conversationId"], 2);
        assert_eq!(json["type"], "user");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_secrets_never_serialize() {
        let token = Token {
            id: 1,
            user_id: 2,
            name: "main".to_string(),
            encrypted_secret: "aa:bb".to_string(),
            active: true,
            created_at: String::new(),
        };

        let json = serde_json::to_value(&token).unwrap();
        assert!(json.get("encryptedSecret").is_none());
    }
}
