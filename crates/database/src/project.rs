//! Project CRUD and state transitions.
//!
//! Project creation is a single transaction that inserts the project row,
//! its membership rows and one conversation per unordered pair implied by
//! the members' `can_message` sets. Budget mutations go through
//! [`decrement_limit`], the atomic decrement-and-maybe-pause primitive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{conversation_pair, LogLevel, Project, SYSTEM_AGENT_ID};

/// Membership to insert at project creation.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub agent_id: i64,
    /// Per-project role override.
    pub role: Option<String>,
    /// Per-project prompt override.
    pub prompt: Option<String>,
    /// Agent ids this member may address.
    pub can_message: Vec<i64>,
}

/// Everything needed to create a project atomically.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub system_prompt: String,
    pub token_id: Option<i64>,
    pub message_limit: i64,
    pub members: Vec<NewMember>,
}

/// Cheap per-iteration worker flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFlags {
    pub paused: bool,
    pub message_limit: i64,
    /// True iff a token is bound and its active flag is set.
    pub token_active: bool,
}

/// Result of the atomic budget decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecrementOutcome {
    pub message_limit: i64,
    /// True when this decrement exhausted the budget and paused the project.
    pub paused_now: bool,
}

/// An unpaused project, with its idle age precomputed for the watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProject {
    pub id: i64,
    pub last_activity_at: String,
    pub idle_seconds: i64,
}

/// Create a project with its members and conversations. Projects start
/// paused; the owner resumes explicitly.
pub async fn create_project(pool: &SqlitePool, new: NewProject) -> Result<Project> {
    let mut tx = pool.begin().await?;

    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (user_id, title, description, system_prompt, token_id, message_limit)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, user_id, title, description, system_prompt, paused,
                  message_limit, token_id, created_at, last_activity_at
        "#,
    )
    .bind(new.user_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.system_prompt)
    .bind(new.token_id)
    .bind(new.message_limit)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Project",
                    id: new.title.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    let member_ids: BTreeSet<i64> = new.members.iter().map(|m| m.agent_id).collect();

    for member in &new.members {
        let can_message = serde_json::to_string(&member.can_message)
            .map_err(|e| DatabaseError::Corrupt {
                column: "can_message",
                reason: e.to_string(),
            })?;

        sqlx::query(
            r#"
            INSERT INTO project_agents (project_id, agent_id, role, prompt, can_message)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(project.id)
        .bind(member.agent_id)
        .bind(&member.role)
        .bind(&member.prompt)
        .bind(&can_message)
        .execute(&mut *tx)
        .await?;
    }

    // One conversation per unordered pair implied by the can_message
    // edges. The System agent may address every member, so each (System,
    // member) pair is implied as well.
    let mut pairs: BTreeSet<(i64, i64)> = BTreeSet::new();
    for member in &new.members {
        pairs.insert(conversation_pair(SYSTEM_AGENT_ID, member.agent_id));
        for &target in &member.can_message {
            if target == member.agent_id {
                continue;
            }
            if target != SYSTEM_AGENT_ID && !member_ids.contains(&target) {
                continue;
            }
            pairs.insert(conversation_pair(member.agent_id, target));
        }
    }

    for (a, b) in pairs {
        sqlx::query(
            r#"
            INSERT INTO conversations (project_id, sender_id, receiver_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(project.id)
        .bind(a)
        .bind(b)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(project)
}

/// Get a project by id.
pub async fn get_project(pool: &SqlitePool, id: i64) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        SELECT id, user_id, title, description, system_prompt, paused,
               message_limit, token_id, created_at, last_activity_at
        FROM projects
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })
}

/// List a user's projects, newest first.
pub async fn list_projects(pool: &SqlitePool, user_id: i64) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, user_id, title, description, system_prompt, paused,
               message_limit, token_id, created_at, last_activity_at
        FROM projects
        WHERE user_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

/// Delete a project. Cascades to memberships, conversations, messages,
/// logs and summaries.
pub async fn delete_project(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Project",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Pause or resume a project. Resuming bumps `last_activity_at` so the
/// watchdog's idle clock restarts.
pub async fn set_paused(pool: &SqlitePool, id: i64, paused: bool) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET paused = ?,
            last_activity_at = CASE WHEN ? = 0 THEN datetime('now') ELSE last_activity_at END
        WHERE id = ?
        RETURNING id, user_id, title, description, system_prompt, paused,
                  message_limit, token_id, created_at, last_activity_at
        "#,
    )
    .bind(paused)
    .bind(paused)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })
}

/// Set the remaining message budget.
pub async fn set_limit(pool: &SqlitePool, id: i64, limit: i64) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET message_limit = ?
        WHERE id = ?
        RETURNING id, user_id, title, description, system_prompt, paused,
                  message_limit, token_id, created_at, last_activity_at
        "#,
    )
    .bind(limit)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })
}

/// Bind (or unbind) the project's token.
pub async fn set_token(pool: &SqlitePool, id: i64, token_id: Option<i64>) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET token_id = ?
        WHERE id = ?
        RETURNING id, user_id, title, description, system_prompt, paused,
                  message_limit, token_id, created_at, last_activity_at
        "#,
    )
    .bind(token_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })
}

/// Atomically decrement the budget. When the new value reaches zero the
/// project is paused and a warn log with code `message-limit` is written
/// in the same transaction.
pub async fn decrement_limit(pool: &SqlitePool, id: i64) -> Result<DecrementOutcome> {
    let mut tx = pool.begin().await?;

    let row: Option<(i64, bool)> = sqlx::query_as(
        r#"
        UPDATE projects
        SET message_limit = message_limit - 1
        WHERE id = ?
        RETURNING message_limit, paused
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let (message_limit, already_paused) = row.ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })?;

    let mut paused_now = false;
    if message_limit <= 0 && !already_paused {
        sqlx::query("UPDATE projects SET paused = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO logs (project_id, level, code, message)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(LogLevel::Warn)
        .bind("message-limit")
        .bind("Message limit reached. Project paused.")
        .execute(&mut *tx)
        .await?;

        paused_now = true;
    }

    tx.commit().await?;
    Ok(DecrementOutcome {
        message_limit,
        paused_now,
    })
}

/// Pause a project with a machine code. Idempotent: a second pause leaves
/// state untouched and writes no further log.
pub async fn pause_with_code(
    pool: &SqlitePool,
    id: i64,
    code: &str,
    message: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE projects SET paused = 1 WHERE id = ? AND paused = 0")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let transitioned = result.rows_affected() > 0;
    if transitioned {
        sqlx::query(
            r#"
            INSERT INTO logs (project_id, level, code, message)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(LogLevel::Warn)
        .bind(code)
        .bind(message)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(transitioned)
}

/// Bump `last_activity_at` to now.
pub async fn touch_activity(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE projects SET last_activity_at = datetime('now') WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Worker loop flags: paused, remaining budget, bound-token health.
pub async fn project_flags(pool: &SqlitePool, id: i64) -> Result<ProjectFlags> {
    let row: Option<(bool, i64, Option<bool>)> = sqlx::query_as(
        r#"
        SELECT p.paused, p.message_limit, t.active
        FROM projects p
        LEFT JOIN tokens t ON t.id = p.token_id
        WHERE p.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let (paused, message_limit, token_active) = row.ok_or_else(|| DatabaseError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })?;

    Ok(ProjectFlags {
        paused,
        message_limit,
        token_active: token_active.unwrap_or(false),
    })
}

/// All unpaused projects with their idle age, for the watchdog scan.
pub async fn active_projects(pool: &SqlitePool) -> Result<Vec<ActiveProject>> {
    let projects = sqlx::query_as::<_, ActiveProject>(
        r#"
        SELECT id, last_activity_at,
               CAST(strftime('%s', 'now') - strftime('%s', last_activity_at) AS INTEGER)
                   AS idle_seconds
        FROM projects
        WHERE paused = 0
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_project, test_db};
    use crate::{conversation, log, user};

    #[tokio::test]
    async fn test_create_builds_conversations_from_edges() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;

        let conversations = conversation::list_conversations(db.pool(), project_id)
            .await
            .unwrap();
        // (System, a), (System, b) and the explicit (a, b) edge.
        assert_eq!(conversations.len(), 3);
        let pairs: Vec<(i64, i64)> = conversations
            .iter()
            .map(|c| (c.sender_id, c.receiver_id))
            .collect();
        assert!(pairs.contains(&conversation_pair(a, b)));
        assert!(pairs.contains(&(0, a)));
        assert!(pairs.contains(&(0, b)));
    }

    #[tokio::test]
    async fn test_projects_start_paused() {
        let db = test_db().await;
        let owner = user::create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let project = create_project(
            db.pool(),
            NewProject {
                user_id: owner.id,
                title: "t".to_string(),
                description: String::new(),
                system_prompt: String::new(),
                token_id: None,
                message_limit: 5,
                members: vec![],
            },
        )
        .await
        .unwrap();

        assert!(project.paused);
    }

    #[tokio::test]
    async fn test_duplicate_title_per_user_rejected() {
        let db = test_db().await;
        let owner = user::create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let new = |title: &str| NewProject {
            user_id: owner.id,
            title: title.to_string(),
            description: String::new(),
            system_prompt: String::new(),
            token_id: None,
            message_limit: 5,
            members: vec![],
        };

        create_project(db.pool(), new("same")).await.unwrap();
        let result = create_project(db.pool(), new("same")).await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_decrement_pauses_at_zero() {
        let db = test_db().await;
        let (_, _, project_id, _, _) = seeded_project(&db).await;
        set_limit(db.pool(), project_id, 1).await.unwrap();

        let outcome = decrement_limit(db.pool(), project_id).await.unwrap();
        assert_eq!(outcome.message_limit, 0);
        assert!(outcome.paused_now);

        let project = get_project(db.pool(), project_id).await.unwrap();
        assert!(project.paused);

        let logs = log::list_logs(db.pool(), project_id).await.unwrap();
        assert!(logs
            .iter()
            .any(|l| l.code.as_deref() == Some("message-limit")));
    }

    #[tokio::test]
    async fn test_pause_with_code_is_idempotent() {
        let db = test_db().await;
        let (_, _, project_id, _, _) = seeded_project(&db).await;

        assert!(pause_with_code(db.pool(), project_id, "stall", "stuck")
            .await
            .unwrap());
        assert!(!pause_with_code(db.pool(), project_id, "stall", "stuck")
            .await
            .unwrap());

        let logs = log::list_logs(db.pool(), project_id).await.unwrap();
        let stall_logs = logs
            .iter()
            .filter(|l| l.code.as_deref() == Some("stall"))
            .count();
        assert_eq!(stall_logs, 1);
    }

    #[tokio::test]
    async fn test_flags_report_token_health() {
        let db = test_db().await;
        let (_, token_id, project_id, _, _) = seeded_project(&db).await;

        let flags = project_flags(db.pool(), project_id).await.unwrap();
        assert!(flags.token_active);
        assert!(!flags.paused);

        crate::token::set_token_active(db.pool(), token_id, false)
            .await
            .unwrap();
        let flags = project_flags(db.pool(), project_id).await.unwrap();
        assert!(!flags.token_active);

        set_token(db.pool(), project_id, None).await.unwrap();
        let flags = project_flags(db.pool(), project_id).await.unwrap();
        assert!(!flags.token_active);
    }

    #[tokio::test]
    async fn test_active_projects_excludes_paused() {
        let db = test_db().await;
        let (_, _, project_id, _, _) = seeded_project(&db).await;

        let active = active_projects(db.pool()).await.unwrap();
        assert!(active.iter().any(|p| p.id == project_id));

        pause_with_code(db.pool(), project_id, "idle", "idle").await.unwrap();
        let active = active_projects(db.pool()).await.unwrap();
        assert!(active.iter().all(|p| p.id != project_id));
    }
}
