//! Internal surface for the turn worker and the watchdog.
//!
//! A separate routing namespace guarded by the pre-shared
//! `X-Brain-Api-Key` header; nothing here is reachable from a user
//! session. Writes publish live-update events after commit but never
//! nudge the worker - the worker is the caller.

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use database::models::conversation_pair;
use database::{context, conversation, log, message, project, summary, LogLevel, MessageKind, MessageStatus};
use hub::ServerEvent;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Header carrying the pre-shared internal key.
pub const INTERNAL_KEY_HEADER: &str = "X-Brain-Api-Key";

/// Build the internal router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/internal/projects/active", get(active_projects))
        .route("/api/internal/projects/:id/context", get(get_context))
        .route("/api/internal/projects/:id/pending", get(pending_queue))
        .route("/api/internal/projects/:id/flags", get(flags))
        .route(
            "/api/internal/projects/:id/oldest-pending",
            get(oldest_pending),
        )
        .route("/api/internal/projects/:id/pause", post(pause))
        .route(
            "/api/internal/projects/:id/limit/decrement",
            post(decrement_limit),
        )
        .route("/api/internal/projects/:id/summaries", get(list_summaries))
        .route(
            "/api/internal/projects/:id/summaries/:agent_id",
            get(get_summary).put(put_summary),
        )
        .route(
            "/api/internal/projects/:id/agents/:agent_id/count",
            post(increment_count),
        )
        .route(
            "/api/internal/projects/:id/agents/:agent_id/recent",
            get(recent_messages),
        )
        .route("/api/internal/messages", post(create_agent_message))
        .route("/api/internal/messages/:id/status", patch(update_status))
        .route("/api/internal/logs", post(create_log))
        .route_layer(middleware::from_fn_with_state(state, require_internal_key))
}

/// Middleware validating the pre-shared key (constant-time comparison).
async fn require_internal_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let expected = state.config.brain_api_key.as_bytes();
    if !bool::from(presented.as_bytes().ct_eq(expected)) {
        return (StatusCode::UNAUTHORIZED, "Invalid or missing internal key").into_response();
    }

    next.run(request).await
}

/// `GET /api/internal/projects/active`
async fn active_projects(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let projects = project::active_projects(state.db.pool()).await?;
    Ok(Json(projects))
}

/// `GET /api/internal/projects/:id/context`
async fn get_context(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let snapshot =
        context::get_context(state.db.pool(), project_id, state.config.context_window).await?;
    Ok(Json(snapshot))
}

/// `GET /api/internal/projects/:id/pending`
async fn pending_queue(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let messages = message::pending_queue(state.db.pool(), project_id).await?;
    Ok(Json(messages))
}

/// `GET /api/internal/projects/:id/flags`
async fn flags(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let flags = project::project_flags(state.db.pool(), project_id).await?;
    Ok(Json(flags))
}

/// `GET /api/internal/projects/:id/oldest-pending`
async fn oldest_pending(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let pending = message::oldest_pending(state.db.pool(), project_id).await?;
    Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PauseBody {
    code: String,
    message: String,
}

/// `POST /api/internal/projects/:id/pause` - idempotent.
async fn pause(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(body): Json<PauseBody>,
) -> Result<impl IntoResponse> {
    let transitioned =
        project::pause_with_code(state.db.pool(), project_id, &body.code, &body.message).await?;

    if transitioned {
        state.hub.publish(
            project_id,
            ServerEvent::project_updated(project_id, Some(true), None),
        );
    }

    Ok(Json(serde_json::json!({ "ok": true, "paused": transitioned })))
}

/// `POST /api/internal/projects/:id/limit/decrement`
async fn decrement_limit(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let outcome = project::decrement_limit(state.db.pool(), project_id).await?;

    if outcome.paused_now {
        state.hub.publish(
            project_id,
            ServerEvent::project_updated(project_id, Some(true), Some(outcome.message_limit)),
        );
    }

    Ok(Json(outcome))
}

/// `GET /api/internal/projects/:id/summaries`
async fn list_summaries(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let summaries = summary::list_summaries(state.db.pool(), project_id).await?;
    Ok(Json(summaries))
}

/// `GET /api/internal/projects/:id/summaries/:agent_id`
async fn get_summary(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let row = summary::get_summary(state.db.pool(), project_id, agent_id).await?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryBody {
    summary: String,
    #[serde(default)]
    history_json: Option<String>,
}

/// `PUT /api/internal/projects/:id/summaries/:agent_id`
async fn put_summary(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(i64, i64)>,
    Json(body): Json<SummaryBody>,
) -> Result<impl IntoResponse> {
    summary::upsert_summary(
        state.db.pool(),
        project_id,
        agent_id,
        &body.summary,
        body.history_json.as_deref(),
    )
    .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/internal/projects/:id/agents/:agent_id/count`
async fn increment_count(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let count = summary::increment_message_count(state.db.pool(), project_id, agent_id).await?;
    Ok(Json(serde_json::json!({ "messageCount": count })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentParams {
    #[serde(default = "default_recent_limit")]
    limit: i64,
}

fn default_recent_limit() -> i64 {
    20
}

/// `GET /api/internal/projects/:id/agents/:agent_id/recent?limit=N`
async fn recent_messages(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(i64, i64)>,
    Query(params): Query<RecentParams>,
) -> Result<impl IntoResponse> {
    let messages =
        message::recent_agent_messages(state.db.pool(), project_id, agent_id, params.limit)
            .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentMessageBody {
    conversation_id: i64,
    project_id: i64,
    sender_id: i64,
    receiver_id: i64,
    content: String,
}

/// `POST /api/internal/messages`
///
/// Inserts an assistant reply (`pending`). The message tuple must be
/// self-consistent with its conversation: the sorted pair equals the
/// conversation's pair.
async fn create_agent_message(
    State(state): State<AppState>,
    Json(body): Json<AgentMessageBody>,
) -> Result<impl IntoResponse> {
    let conv = conversation::get_conversation(state.db.pool(), body.conversation_id).await?;
    if conv.project_id != body.project_id {
        return Err(ApiError::Validation(
            "conversation belongs to another project".to_string(),
        ));
    }
    if conversation_pair(body.sender_id, body.receiver_id) != (conv.sender_id, conv.receiver_id) {
        return Err(ApiError::Validation(
            "sender/receiver pair does not match the conversation".to_string(),
        ));
    }

    let created = message::create_message(
        state.db.pool(),
        message::NewMessage {
            conversation_id: body.conversation_id,
            project_id: body.project_id,
            sender_id: body.sender_id,
            receiver_id: body.receiver_id,
            content: body.content,
            kind: MessageKind::Assistant,
            status: MessageStatus::Pending,
        },
    )
    .await?;

    state
        .hub
        .publish(body.project_id, ServerEvent::NewMessage(created.clone()));

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: MessageStatus,
}

/// `PATCH /api/internal/messages/:id/status`
async fn update_status(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<impl IntoResponse> {
    let updated = message::update_status(state.db.pool(), message_id, body.status).await?;

    state.hub.publish(
        updated.project_id,
        ServerEvent::message_updated(&updated),
    );

    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogBody {
    #[serde(default)]
    project_id: Option<i64>,
    level: LogLevel,
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// `POST /api/internal/logs`
async fn create_log(
    State(state): State<AppState>,
    Json(body): Json<LogBody>,
) -> Result<impl IntoResponse> {
    let created = log::append_log(
        state.db.pool(),
        body.project_id,
        body.level,
        body.code.as_deref(),
        &body.message,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
