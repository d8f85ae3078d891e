//! Session-cookie authentication.
//!
//! Sessions are HMAC-signed values carrying a user id and expiry (see
//! `crypto::SessionSigner`), transported in the `session` cookie only.
//! The middleware verifies the cookie and injects [`CurrentUser`] into
//! request extensions for handlers to consume.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie name for the session value.
pub const SESSION_COOKIE: &str = "session";

/// The authenticated caller, injected by [`require_session`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

/// Extract the session cookie value from request headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Resolve the caller's user id from the request headers.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<i64, ApiError> {
    let value = session_cookie(headers).ok_or(ApiError::Unauthenticated)?;
    state
        .sessions
        .verify(&value)
        .map_err(|_| ApiError::Unauthenticated)
}

/// Middleware guarding the user-facing surface.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()) {
        Ok(user_id) => {
            request.extensions_mut().insert(CurrentUser(user_id));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// `Set-Cookie` value establishing a session.
pub fn issue_cookie(state: &AppState, user_id: i64) -> String {
    let ttl = Duration::from_secs(state.config.session_ttl_secs);
    let value = state.sessions.issue(user_id, ttl);
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        value,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def.123; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc.def.123"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(session_cookie(&headers).is_none());

        assert!(session_cookie(&HeaderMap::new()).is_none());
    }
}
