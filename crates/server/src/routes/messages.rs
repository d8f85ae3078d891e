//! Message listing and user sends.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use database::{
    conversation, message, validation, Conversation, MessageKind, MessageStatus, SYSTEM_AGENT_ID,
};
use hub::ServerEvent;

use crate::error::Result;
use crate::routes::projects::{ensure_mutable, owned_project};
use crate::session::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: Option<MessageKind>,
}

/// The agent a System-attributed send lands on: the first non-System
/// participant of the conversation.
fn infer_receiver(conversation: &Conversation) -> i64 {
    if conversation.sender_id != SYSTEM_AGENT_ID {
        conversation.sender_id
    } else {
        conversation.receiver_id
    }
}

/// `GET /api/messages/:conversation_id` - oldest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let conv = conversation::get_conversation(state.db.pool(), conversation_id).await?;
    owned_project(&state, user_id, conv.project_id).await?;

    let messages = message::list_conversation_messages(state.db.pool(), conversation_id).await?;
    Ok(Json(messages))
}

/// `POST /api/messages/:conversation_id`
///
/// A user send is attributed to the System agent with the inferred
/// receiver; the row lands `pending` and the worker is nudged. Sends are
/// accepted while the project is paused - they stay pending until resume.
pub async fn send(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(conversation_id): Path<i64>,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse> {
    let conv = conversation::get_conversation(state.db.pool(), conversation_id).await?;
    ensure_mutable(&state, conv.project_id)?;
    owned_project(&state, user_id, conv.project_id).await?;

    validation::validate_message_content(&body.content, state.config.max_message_length)?;

    let created = message::create_message(
        state.db.pool(),
        message::NewMessage {
            conversation_id,
            project_id: conv.project_id,
            sender_id: SYSTEM_AGENT_ID,
            receiver_id: infer_receiver(&conv),
            content: body.content,
            kind: body.kind.unwrap_or(MessageKind::User),
            status: MessageStatus::Pending,
        },
    )
    .await?;

    state
        .hub
        .publish(conv.project_id, ServerEvent::NewMessage(created.clone()));
    state.nudger.nudge(conv.project_id);

    Ok((StatusCode::CREATED, Json(created)))
}
