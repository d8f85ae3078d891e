//! Project CRUD and the pause/resume toggle.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use database::{
    agent, conversation, member, project, token, validation, Conversation, DatabaseError, Project,
    ProjectMember, SYSTEM_AGENT_ID,
};
use hub::ServerEvent;

use crate::error::{ApiError, Result};
use crate::session::CurrentUser;
use crate::state::AppState;

/// Budget assigned when the caller does not pick one.
const DEFAULT_MESSAGE_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Existing agent to enroll.
    #[serde(default, alias = "agent_id")]
    pub agent_id: Option<i64>,
    /// Inline definition (used when `agentId` is absent).
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    /// Per-project prompt override.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Agent ids this member may address. Omitted means every other
    /// member.
    #[serde(default, alias = "can_message_ids")]
    pub can_message_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "system_prompt")]
    pub system_prompt: String,
    #[serde(default, alias = "token_id")]
    pub token_id: Option<i64>,
    #[serde(default, alias = "message_limit")]
    pub message_limit: Option<i64>,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub paused: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub conversations: Vec<Conversation>,
    pub token: Option<TokenRef>,
}

/// Load a project and enforce ownership.
pub(crate) async fn owned_project(
    state: &AppState,
    user_id: i64,
    project_id: i64,
) -> Result<Project> {
    let found = project::get_project(state.db.pool(), project_id).await?;
    if found.user_id != user_id {
        return Err(ApiError::NotFound);
    }
    Ok(found)
}

/// Reject writes against demo/snapshot projects.
pub(crate) fn ensure_mutable(state: &AppState, project_id: i64) -> Result<()> {
    if state.config.is_protected_project(project_id) {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// `GET /api/projects`
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let projects = project::list_projects(state.db.pool(), user_id).await?;
    Ok(Json(projects))
}

/// `GET /api/projects/:id`
pub async fn detail(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let found = owned_project(&state, user_id, project_id).await?;

    let members = member::list_members(state.db.pool(), project_id).await?;
    let conversations = conversation::list_conversations(state.db.pool(), project_id).await?;
    let token = match found.token_id {
        Some(token_id) => {
            let t = token::get_token(state.db.pool(), token_id).await?;
            Some(TokenRef {
                id: t.id,
                name: t.name,
                active: t.active,
            })
        }
        None => None,
    };

    Ok(Json(ProjectDetail {
        project: found,
        members,
        conversations,
        token,
    }))
}

/// `POST /api/projects`
///
/// Atomically inserts the project, membership rows (creating inline agent
/// definitions first) and one conversation per pair implied by the
/// `canMessageIds` sets.
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(body): Json<CreateProjectBody>,
) -> Result<impl IntoResponse> {
    validation::validate_name("title", &body.title)?;

    if let Some(token_id) = body.token_id {
        let bound = token::get_token(state.db.pool(), token_id).await?;
        if bound.user_id != user_id {
            return Err(ApiError::NotFound);
        }
        if !bound.active {
            return Err(ApiError::Validation("token is disabled".to_string()));
        }
    }

    let mut message_limit = body.message_limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    validation::validate_limit(message_limit)?;
    if state.config.is_demo_user(user_id) {
        message_limit = message_limit.min(state.config.demo_message_limit);
    }

    // Resolve members: enroll existing agents, create inline definitions.
    let mut resolved: Vec<(i64, AgentSpec)> = Vec::with_capacity(body.agents.len());
    for spec in body.agents {
        let agent_id = match spec.agent_id {
            Some(agent_id) => {
                let existing = agent::get_agent(state.db.pool(), agent_id).await?;
                if existing.user_id != Some(user_id) {
                    return Err(ApiError::NotFound);
                }
                agent_id
            }
            None => {
                let name = spec
                    .name
                    .as_deref()
                    .ok_or_else(|| {
                        ApiError::SchemaInvalid("agent entry needs agentId or name".to_string())
                    })?
                    .trim()
                    .to_string();
                validation::validate_name("name", &name)?;
                let created = agent::create_agent(
                    state.db.pool(),
                    user_id,
                    &name,
                    &spec.role,
                    &spec.description,
                    &spec.model,
                )
                .await?;
                created.id
            }
        };
        resolved.push((agent_id, spec));
    }

    let member_ids: BTreeSet<i64> = resolved.iter().map(|(id, _)| *id).collect();
    if member_ids.len() != resolved.len() {
        return Err(ApiError::Validation("duplicate agent in project".to_string()));
    }

    let mut members = Vec::with_capacity(resolved.len());
    for (agent_id, spec) in resolved {
        let can_message = match spec.can_message_ids {
            Some(ids) => {
                for &target in &ids {
                    if target != SYSTEM_AGENT_ID && !member_ids.contains(&target) {
                        return Err(ApiError::Validation(format!(
                            "canMessageIds references non-member agent {}",
                            target
                        )));
                    }
                }
                ids
            }
            // Full mesh by default.
            None => member_ids
                .iter()
                .copied()
                .filter(|&id| id != agent_id)
                .collect(),
        };

        members.push(project::NewMember {
            agent_id,
            role: None,
            prompt: spec.prompt,
            can_message,
        });
    }

    let created = project::create_project(
        state.db.pool(),
        project::NewProject {
            user_id,
            title: body.title.trim().to_string(),
            description: body.description,
            system_prompt: body.system_prompt,
            token_id: body.token_id,
            message_limit,
            members,
        },
    )
    .await
    .map_err(|e| match e {
        DatabaseError::AlreadyExists { .. } => ApiError::Conflict("title-taken"),
        other => other.into(),
    })?;

    tracing::info!(project_id = created.id, "created project");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /api/projects/:id`
pub async fn remove(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse> {
    ensure_mutable(&state, project_id)?;
    owned_project(&state, user_id, project_id).await?;

    project::delete_project(state.db.pool(), project_id).await?;
    tracing::info!(project_id, "deleted project");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/projects/:id/status`
pub async fn set_status(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<impl IntoResponse> {
    let updated = apply_pause(&state, user_id, project_id, body.paused).await?;
    Ok(Json(updated))
}

/// Shared pause/resume transition: persists, publishes `project_updated`,
/// and nudges the worker on resume.
pub(crate) async fn apply_pause(
    state: &AppState,
    user_id: i64,
    project_id: i64,
    paused: bool,
) -> Result<Project> {
    ensure_mutable(state, project_id)?;
    owned_project(state, user_id, project_id).await?;

    let updated = project::set_paused(state.db.pool(), project_id, paused).await?;

    state.hub.publish(
        project_id,
        ServerEvent::project_updated(project_id, Some(updated.paused), None),
    );
    if !updated.paused {
        state.nudger.nudge(project_id);
    }

    Ok(updated)
}
