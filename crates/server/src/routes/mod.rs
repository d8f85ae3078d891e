//! Route handlers for the API service.

pub mod agents;
pub mod auth;
pub mod conversations;
pub mod internal;
pub mod logs;
pub mod messages;
pub mod projects;
pub mod settings;
pub mod tokens;

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::session::require_session;
use crate::state::AppState;
use crate::ws;

/// Build the full router: public auth routes, the session-guarded user
/// surface, the key-guarded internal surface and the live-update endpoint.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let user_surface = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/agents", get(agents::list).post(agents::create))
        .route("/api/tokens", get(tokens::list).post(tokens::create))
        .route("/api/tokens/:id", delete(tokens::remove))
        .route("/api/tokens/:id/enable", patch(tokens::enable))
        .route("/api/tokens/:id/disable", patch(tokens::disable))
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/:id",
            get(projects::detail).delete(projects::remove),
        )
        .route("/api/projects/:id/status", post(projects::set_status))
        .route("/api/settings/project/:id/token", patch(settings::set_token))
        .route("/api/settings/project/:id/pause", patch(settings::set_pause))
        .route("/api/settings/project/:id/limit", patch(settings::set_limit))
        .route(
            "/api/conversations/:project_id",
            get(conversations::list).post(conversations::create),
        )
        .route(
            "/api/messages/:conversation_id",
            get(messages::list).post(messages::send),
        )
        .route("/api/logs/:project_id", get(logs::list).delete(logs::clear))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .merge(public)
        .merge(user_surface)
        .merge(internal::router(state.clone()))
        .route("/", get(ws::live_updates))
        .with_state(state)
}
