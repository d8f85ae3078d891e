//! Typed server events pushed to live-update subscribers.

use database::models::{Message, MessageStatus};
use serde::{Deserialize, Serialize};

/// An event delivered to subscribed UI clients.
///
/// The wire frame is `{"type": ..., "payload": ...}` with camelCase
/// payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message was inserted (full normalized row).
    NewMessage(Message),
    /// A message's status changed.
    MessageUpdated {
        id: i64,
        status: MessageStatus,
        #[serde(rename = "conversationId")]
        conversation_id: i64,
    },
    /// Project state changed (only the changed fields are present).
    ProjectUpdated {
        #[serde(rename = "projectId")]
        project_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        paused: Option<bool>,
        #[serde(rename = "messageLimit", skip_serializing_if = "Option::is_none")]
        message_limit: Option<i64>,
    },
}

impl ServerEvent {
    pub fn message_updated(message: &Message) -> Self {
        Self::MessageUpdated {
            id: message.id,
            status: message.status,
            conversation_id: message.conversation_id,
        }
    }

    pub fn project_updated(project_id: i64, paused: Option<bool>, message_limit: Option<i64>) -> Self {
        Self::ProjectUpdated {
            project_id,
            paused,
            message_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_frame_shape() {
        let event = ServerEvent::project_updated(7, Some(true), None);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "project_updated");
        assert_eq!(json["payload"]["projectId"], 7);
        assert_eq!(json["payload"]["paused"], true);
        assert!(json["payload"].get("messageLimit").is_none());
    }

    #[test]
    fn test_message_updated_payload() {
        let event = ServerEvent::MessageUpdated {
            id: 3,
            status: MessageStatus::Sent,
            conversation_id: 9,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "message_updated");
        assert_eq!(json["payload"]["status"], "sent");
        assert_eq!(json["payload"]["conversationId"], 9);
    }
}
