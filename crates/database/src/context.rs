//! Read-consistent project snapshot for the turn worker.
//!
//! Everything the worker needs for one run is fetched inside a single
//! transaction: project config, members with resolved overrides, the
//! conversation map, the latest summary row per agent and a recent message
//! window. Messages created after the snapshot are picked up through the
//! pending queue, not through this context.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{AgentSummary, Conversation, Message, Project, ProjectMember};

/// Bound-token material for the worker. Only travels over the internal
/// surface; the secret is still encrypted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContextToken {
    pub encrypted_secret: String,
    pub active: bool,
}

/// Atomic snapshot of everything a project run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project: Project,
    pub token: Option<ContextToken>,
    pub members: Vec<ProjectMember>,
    pub conversations: Vec<Conversation>,
    pub summaries: Vec<AgentSummary>,
    /// Last `limit` messages across the project, newest first.
    pub recent_messages: Vec<Message>,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    project_id: i64,
    agent_id: i64,
    name: String,
    role: String,
    prompt: String,
    model: String,
    can_message: String,
}

/// Fetch the snapshot. `message_limit` caps the recent message window.
pub async fn get_context(
    pool: &SqlitePool,
    project_id: i64,
    message_limit: i64,
) -> Result<ProjectContext> {
    let mut tx = pool.begin().await?;

    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, user_id, title, description, system_prompt, paused,
               message_limit, token_id, created_at, last_activity_at
        FROM projects
        WHERE id = ?
        "#,
    )
    .bind(project_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: project_id.to_string(),
    })?;

    let token = match project.token_id {
        Some(token_id) => sqlx::query_as::<_, ContextToken>(
            "SELECT encrypted_secret, active FROM tokens WHERE id = ?",
        )
        .bind(token_id)
        .fetch_optional(&mut *tx)
        .await?,
        None => None,
    };

    let member_rows = sqlx::query_as::<_, MemberRow>(
        r#"
        SELECT pa.project_id, pa.agent_id, a.name,
               COALESCE(pa.role, a.role) AS role,
               COALESCE(pa.prompt, a.description) AS prompt,
               a.model, pa.can_message
        FROM project_agents pa
        JOIN agents a ON a.id = pa.agent_id
        WHERE pa.project_id = ?
        ORDER BY pa.agent_id
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *tx)
    .await?;

    let members = member_rows
        .into_iter()
        .map(|row| {
            let can_message: Vec<i64> = serde_json::from_str(&row.can_message)
                .map_err(|e| DatabaseError::Corrupt {
                    column: "can_message",
                    reason: e.to_string(),
                })?;
            Ok(ProjectMember {
                project_id: row.project_id,
                agent_id: row.agent_id,
                name: row.name,
                role: row.role,
                prompt: row.prompt,
                model: row.model,
                can_message,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, project_id, sender_id, receiver_id, created_at
        FROM conversations
        WHERE project_id = ?
        ORDER BY id
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *tx)
    .await?;

    let summaries = sqlx::query_as::<_, AgentSummary>(
        r#"
        SELECT project_id, agent_id, summary, history_json, message_count,
               summary_count, updated_at
        FROM agent_summaries
        WHERE project_id = ?
        ORDER BY agent_id
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *tx)
    .await?;

    let recent_messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, project_id, sender_id, receiver_id,
               content, type, status, created_at
        FROM messages
        WHERE project_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(project_id)
    .bind(message_limit)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ProjectContext {
        project,
        token,
        members,
        conversations,
        summaries,
        recent_messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, MessageStatus, SYSTEM_AGENT_ID};
    use crate::test_support::{seeded_project, test_db};
    use crate::{conversation, message, summary};

    #[tokio::test]
    async fn test_snapshot_contents() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;

        let conv = conversation::find_by_pair(db.pool(), project_id, a, b)
            .await
            .unwrap()
            .unwrap();
        message::create_message(
            db.pool(),
            message::NewMessage {
                conversation_id: conv.id,
                project_id,
                sender_id: SYSTEM_AGENT_ID,
                receiver_id: a,
                content: "kickoff".to_string(),
                kind: MessageKind::User,
                status: MessageStatus::Pending,
            },
        )
        .await
        .unwrap();
        summary::upsert_summary(db.pool(), project_id, a, "Ada knows things.", None)
            .await
            .unwrap();

        let context = get_context(db.pool(), project_id, 50).await.unwrap();

        assert_eq!(context.project.id, project_id);
        assert_eq!(context.members.len(), 2);
        assert_eq!(context.conversations.len(), 3);
        assert_eq!(context.summaries.len(), 1);
        assert_eq!(context.recent_messages.len(), 1);

        let token = context.token.unwrap();
        assert!(token.active);
        assert_eq!(token.encrypted_secret, "aa:bb");
    }

    #[tokio::test]
    async fn test_snapshot_missing_project() {
        let db = test_db().await;
        let result = get_context(db.pool(), 404, 50).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }
}
