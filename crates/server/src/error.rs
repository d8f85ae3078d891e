//! Error types for the API surface.
//!
//! User-visible messages come from a fixed dictionary keyed by error kind;
//! handlers never leak raw persistence errors to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use thiserror::Error;

/// Errors surfaced by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation checks.
    #[error("validation: {0}")]
    Validation(String),

    /// Request body did not match the expected schema.
    #[error("schema-invalid: {0}")]
    SchemaInvalid(String),

    /// Missing or invalid session.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Wrong email/password pair.
    #[error("bad-credentials")]
    BadCredentials,

    /// Demo/snapshot protection or not the owner of a protected resource.
    #[error("forbidden")]
    Forbidden,

    /// Resource absent or not owned by the caller.
    #[error("not-found")]
    NotFound,

    /// Uniqueness or in-use conflict; carries the conflict code.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    /// Unexpected persistence error.
    #[error("database error: {0}")]
    Database(DatabaseError),

    /// Any other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { .. } => ApiError::NotFound,
            DatabaseError::AlreadyExists { .. } => ApiError::Conflict("already-exists"),
            DatabaseError::InUse { entity: "Token", .. } => ApiError::Conflict("token-in-use"),
            DatabaseError::InUse { .. } => ApiError::Conflict("in-use"),
            other => ApiError::Database(other),
        }
    }
}

impl From<database::validation::ValidationError> for ApiError {
    fn from(err: database::validation::ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Fixed user-visible message per conflict code.
fn conflict_message(code: &str) -> &'static str {
    match code {
        "email-in-use" => "That email address is already registered.",
        "title-taken" => "You already have a project with that title.",
        "token-in-use" => "The token is bound to a project and cannot be deleted.",
        "already-exists" => "The resource already exists.",
        _ => "Conflicting request.",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            ApiError::SchemaInvalid(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "schema-invalid",
                msg.clone(),
            ),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Sign in to continue.".to_string(),
            ),
            ApiError::BadCredentials => (
                StatusCode::UNAUTHORIZED,
                "bad-credentials",
                "Wrong email or password.".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "This resource is protected.".to_string(),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "not-found",
                "The resource does not exist.".to_string(),
            ),
            ApiError::Conflict(code) => (
                StatusCode::CONFLICT,
                *code,
                conflict_message(code).to_string(),
            ),
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Unexpected server error.".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Unexpected server error.".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_mapping() {
        let not_found = ApiError::from(DatabaseError::NotFound {
            entity: "Project",
            id: "1".to_string(),
        });
        assert!(matches!(not_found, ApiError::NotFound));

        let in_use = ApiError::from(DatabaseError::InUse {
            entity: "Token",
            id: "1".to_string(),
        });
        assert!(matches!(in_use, ApiError::Conflict("token-in-use")));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Conflict("email-in-use").into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
