//! Per-project settings: token binding, pause toggle, message budget.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use database::{project, token, validation};
use hub::ServerEvent;

use crate::error::{ApiError, Result};
use crate::routes::projects::{apply_pause, ensure_mutable, owned_project};
use crate::session::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBody {
    #[serde(default, alias = "token_id")]
    pub token_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseBody {
    pub paused: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitBody {
    pub limit: i64,
}

/// `PATCH /api/settings/project/:id/token`
///
/// Binds a token (or unbinds with `tokenId: null`). Foreign tokens are
/// invisible (404); inactive tokens are refused.
pub async fn set_token(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<TokenBody>,
) -> Result<impl IntoResponse> {
    ensure_mutable(&state, project_id)?;
    owned_project(&state, user_id, project_id).await?;

    if let Some(token_id) = body.token_id {
        let bound = token::get_token(state.db.pool(), token_id).await?;
        if bound.user_id != user_id {
            return Err(ApiError::NotFound);
        }
        if !bound.active {
            return Err(ApiError::Validation("token is disabled".to_string()));
        }
    }

    let updated = project::set_token(state.db.pool(), project_id, body.token_id).await?;
    Ok(Json(updated))
}

/// `PATCH /api/settings/project/:id/pause`
pub async fn set_pause(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<PauseBody>,
) -> Result<impl IntoResponse> {
    let updated = apply_pause(&state, user_id, project_id, body.paused).await?;
    Ok(Json(updated))
}

/// `PATCH /api/settings/project/:id/limit`
///
/// Sets the remaining budget (≥ 0). The demo user is clamped to the
/// configured ceiling. Setting a budget never pauses or resumes by
/// itself.
pub async fn set_limit(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<LimitBody>,
) -> Result<impl IntoResponse> {
    ensure_mutable(&state, project_id)?;
    owned_project(&state, user_id, project_id).await?;
    validation::validate_limit(body.limit)?;

    let mut limit = body.limit;
    if state.config.is_demo_user(user_id) {
        limit = limit.min(state.config.demo_message_limit);
    }

    let updated = project::set_limit(state.db.pool(), project_id, limit).await?;

    state.hub.publish(
        project_id,
        ServerEvent::project_updated(project_id, None, Some(updated.message_limit)),
    );

    Ok(Json(updated))
}
