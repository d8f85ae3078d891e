//! Conversation listing and user-initiated creation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use database::{conversation, member, SYSTEM_AGENT_ID};

use crate::error::{ApiError, Result};
use crate::routes::projects::{ensure_mutable, owned_project};
use crate::session::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationBody {
    #[serde(alias = "receiver_id")]
    pub receiver_id: i64,
}

/// `GET /api/conversations/:project_id`
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    owned_project(&state, user_id, project_id).await?;

    let conversations = conversation::list_conversations(state.db.pool(), project_id).await?;
    Ok(Json(conversations))
}

/// `POST /api/conversations/:project_id`
///
/// The user always acts as the System agent, so the created pair is
/// (System, receiver). Get-or-create on the normalized pair keeps
/// conversation uniqueness.
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<CreateConversationBody>,
) -> Result<impl IntoResponse> {
    ensure_mutable(&state, project_id)?;
    owned_project(&state, user_id, project_id).await?;

    if body.receiver_id == SYSTEM_AGENT_ID {
        return Err(ApiError::Validation(
            "receiver must be a project agent".to_string(),
        ));
    }
    if !member::is_member(state.db.pool(), project_id, body.receiver_id).await? {
        return Err(ApiError::Validation(
            "receiver is not a project member".to_string(),
        ));
    }

    let created =
        conversation::get_or_create(state.db.pool(), project_id, SYSTEM_AGENT_ID, body.receiver_id)
            .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
