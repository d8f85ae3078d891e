//! Project membership queries.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{ProjectMember, SYSTEM_AGENT_ID};

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

impl MemberRow {
    fn decode(self) -> Result<ProjectMember> {
        let can_message: Vec<i64> =
            serde_json::from_str(&self.can_message).map_err(|e| DatabaseError::Corrupt {
                column: "can_message",
                reason: e.to_string(),
            })?;

        Ok(ProjectMember {
            project_id: self.project_id,
            agent_id: self.agent_id,
            name: self.name,
            role: self.role,
            prompt: self.prompt,
            model: self.model,
            can_message,
        })
    }
}

/// List a project's members with effective role/prompt values.
pub async fn list_members(pool: &SqlitePool, project_id: i64) -> Result<Vec<ProjectMember>> {
    let rows = sqlx::query_as::<_, MemberRow>(
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
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(MemberRow::decode).collect()
}

/// Whether an agent participates in a project. The System agent is an
/// implicit member of every project.
pub async fn is_member(pool: &SqlitePool, project_id: i64, agent_id: i64) -> Result<bool> {
    if agent_id == SYSTEM_AGENT_ID {
        return Ok(true);
    }

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM project_agents WHERE project_id = ? AND agent_id = ?",
    )
    .bind(project_id)
    .bind(agent_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_project, test_db};

    #[tokio::test]
    async fn test_list_members_resolves_overrides() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;

        let members = list_members(db.pool(), project_id).await.unwrap();
        assert_eq!(members.len(), 2);

        let ada = members.iter().find(|m| m.agent_id == a).unwrap();
        assert_eq!(ada.role, "planner");
        assert_eq!(ada.prompt, "Plans.");
        assert_eq!(ada.can_message, vec![b]);
    }

    #[tokio::test]
    async fn test_system_agent_is_implicit_member() {
        let db = test_db().await;
        let (_, _, project_id, a, _) = seeded_project(&db).await;

        assert!(is_member(db.pool(), project_id, SYSTEM_AGENT_ID).await.unwrap());
        assert!(is_member(db.pool(), project_id, a).await.unwrap());
        assert!(!is_member(db.pool(), project_id, 9999).await.unwrap());
    }
}
