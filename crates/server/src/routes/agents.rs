//! Agent listing and creation.
//!
//! There is no user-facing agent delete: agents disappear only through
//! their owner's deletion, and memberships through project deletion.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use database::{agent, validation};

use crate::error::Result;
use crate::session::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentBody {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
}

/// `GET /api/agents`
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let agents = agent::list_agents(state.db.pool(), user_id).await?;
    Ok(Json(agents))
}

/// `POST /api/agents`
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(body): Json<CreateAgentBody>,
) -> Result<impl IntoResponse> {
    validation::validate_name("name", &body.name)?;

    let created = agent::create_agent(
        state.db.pool(),
        user_id,
        body.name.trim(),
        &body.role,
        &body.description,
        &body.model,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
