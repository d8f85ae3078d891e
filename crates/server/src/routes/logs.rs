//! Project log listing and bulk clear.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};

use database::log;

use crate::error::Result;
use crate::routes::projects::owned_project;
use crate::session::CurrentUser;
use crate::state::AppState;

/// `GET /api/logs/:project_id` - newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    owned_project(&state, user_id, project_id).await?;

    let logs = log::list_logs(state.db.pool(), project_id).await?;
    Ok(Json(logs))
}

/// `DELETE /api/logs/:project_id`
pub async fn clear(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    owned_project(&state, user_id, project_id).await?;

    let removed = log::clear_logs(state.db.pool(), project_id).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
