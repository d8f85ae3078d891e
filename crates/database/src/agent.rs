//! Agent CRUD operations.
//!
//! Agents are only deleted transitively: dropping a user cascades to their
//! agents, and dropping a project cascades to its membership rows. The
//! System agent (id 0) is global and preseeded by the migration.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Agent;

/// Create a new agent owned by a user.
pub async fn create_agent(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    role: &str,
    description: &str,
    model: &str,
) -> Result<Agent> {
    let agent = sqlx::query_as::<_, Agent>(
        r#"
        INSERT INTO agents (user_id, name, role, description, model)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, user_id, name, role, description, model, created_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(role)
    .bind(description)
    .bind(model)
    .fetch_one(pool)
    .await?;

    Ok(agent)
}

/// Get an agent by id.
pub async fn get_agent(pool: &SqlitePool, id: i64) -> Result<Agent> {
    sqlx::query_as::<_, Agent>(
        r#"
        SELECT id, user_id, name, role, description, model, created_at
        FROM agents
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Agent",
        id: id.to_string(),
    })
}

/// List a user's agents, oldest first.
pub async fn list_agents(pool: &SqlitePool, user_id: i64) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>(
        r#"
        SELECT id, user_id, name, role, description, model, created_at
        FROM agents
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(agents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;
    use crate::user;

    #[tokio::test]
    async fn test_agent_crud() {
        let db = test_db().await;
        let owner = user::create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let agent = create_agent(db.pool(), owner.id, "Ada", "planner", "Plans.", "gpt-4o")
            .await
            .unwrap();
        assert!(agent.id > 0);

        let fetched = get_agent(db.pool(), agent.id).await.unwrap();
        assert_eq!(fetched.name, "Ada");
        assert_eq!(fetched.user_id, Some(owner.id));

        let listed = list_agents(db.pool(), owner.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_system_agent_not_listed_per_user() {
        let db = test_db().await;
        let owner = user::create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let listed = list_agents(db.pool(), owner.id).await.unwrap();
        assert!(listed.is_empty());
    }
}
