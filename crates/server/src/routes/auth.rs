//! Registration, login and session introspection.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse};
use axum::{Extension, Json};
use serde::Deserialize;

use database::{user, validation, DatabaseError};

use crate::error::{ApiError, Result};
use crate::session::{clear_cookie, issue_cookie, CurrentUser};
use crate::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse> {
    validation::validate_name("username", &body.username)?;
    validation::validate_email(&body.email)?;
    if body.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let password_hash = crypto::password::hash_password(&body.password)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let created = user::create_user(
        state.db.pool(),
        body.username.trim(),
        body.email.trim(),
        &password_hash,
    )
    .await
    .map_err(|e| match e {
        DatabaseError::AlreadyExists { .. } => ApiError::Conflict("email-in-use"),
        other => other.into(),
    })?;

    tracing::info!(user_id = created.id, "registered user");

    let cookie = issue_cookie(&state, created.id);
    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(created),
    ))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse> {
    let found = user::get_user_by_email(state.db.pool(), body.email.trim()).await?;
    let found = found.ok_or(ApiError::BadCredentials)?;

    let matches = crypto::password::verify_password(&body.password, &found.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !matches {
        return Err(ApiError::BadCredentials);
    }

    let cookie = issue_cookie(&state, found.id);
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(found)))
}

/// `POST /api/auth/logout`
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_cookie())]),
        Json(serde_json::json!({ "ok": true })),
    )
}

/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let found = user::get_user(state.db.pool(), user_id).await?;
    Ok(Json(found))
}
