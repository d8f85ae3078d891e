//! Token management.
//!
//! Plaintext keys exist only inside the create handler; everything at rest
//! and on the wire is the `iv_hex:data_hex` ciphertext, which responses
//! never include.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use database::{token, validation, Token};

use crate::error::{ApiError, Result};
use crate::session::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenBody {
    pub name: String,
    #[serde(alias = "api_key")]
    pub api_key: String,
}

/// Load a token and enforce ownership.
async fn owned_token(state: &AppState, user_id: i64, token_id: i64) -> Result<Token> {
    let found = token::get_token(state.db.pool(), token_id).await?;
    if found.user_id != user_id {
        return Err(ApiError::NotFound);
    }
    Ok(found)
}

/// `GET /api/tokens`
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let tokens = token::list_tokens(state.db.pool(), user_id).await?;
    Ok(Json(tokens))
}

/// `POST /api/tokens`
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(body): Json<CreateTokenBody>,
) -> Result<impl IntoResponse> {
    validation::validate_name("name", &body.name)?;
    if body.api_key.trim().is_empty() {
        return Err(ApiError::Validation("apiKey cannot be empty".to_string()));
    }

    let encrypted = state.cipher.encrypt(body.api_key.trim());
    let created = token::create_token(state.db.pool(), user_id, body.name.trim(), &encrypted).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /api/tokens/:id`
pub async fn remove(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(token_id): Path<i64>,
) -> Result<impl IntoResponse> {
    if state.config.is_protected_token(token_id) {
        return Err(ApiError::Forbidden);
    }
    owned_token(&state, user_id, token_id).await?;

    token::delete_token(state.db.pool(), token_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `PATCH /api/tokens/:id/enable`
pub async fn enable(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(token_id): Path<i64>,
) -> Result<impl IntoResponse> {
    owned_token(&state, user_id, token_id).await?;

    let updated = token::set_token_active(state.db.pool(), token_id, true).await?;
    Ok(Json(updated))
}

/// `PATCH /api/tokens/:id/disable`
pub async fn disable(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(token_id): Path<i64>,
) -> Result<impl IntoResponse> {
    if state.config.is_protected_token(token_id) {
        return Err(ApiError::Forbidden);
    }
    owned_token(&state, user_id, token_id).await?;

    let updated = token::set_token_active(state.db.pool(), token_id, false).await?;
    Ok(Json(updated))
}
