//! Agent memory summary persistence.
//!
//! One row per (project, agent). `message_count` tracks messages sent by
//! the agent since the last summarization; [`upsert_summary`] zeroes it
//! and bumps `summary_count`.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::AgentSummary;

/// Replace the summary for (project, agent). Resets `message_count` and
/// increments `summary_count`.
pub async fn upsert_summary(
    pool: &SqlitePool,
    project_id: i64,
    agent_id: i64,
    summary: &str,
    history_json: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO agent_summaries (project_id, agent_id, summary, history_json, message_count, summary_count)
        VALUES (?, ?, ?, ?, 0, 1)
        ON CONFLICT(project_id, agent_id) DO UPDATE SET
            summary = excluded.summary,
            history_json = excluded.history_json,
            message_count = 0,
            summary_count = agent_summaries.summary_count + 1,
            updated_at = datetime('now')
        "#,
    )
    .bind(project_id)
    .bind(agent_id)
    .bind(summary)
    .bind(history_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the summary row for (project, agent).
pub async fn get_summary(
    pool: &SqlitePool,
    project_id: i64,
    agent_id: i64,
) -> Result<Option<AgentSummary>> {
    let record = sqlx::query_as::<_, AgentSummary>(
        r#"
        SELECT project_id, agent_id, summary, history_json, message_count,
               summary_count, updated_at
        FROM agent_summaries
        WHERE project_id = ? AND agent_id = ?
        "#,
    )
    .bind(project_id)
    .bind(agent_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// All summary rows of a project.
pub async fn list_summaries(pool: &SqlitePool, project_id: i64) -> Result<Vec<AgentSummary>> {
    let records = sqlx::query_as::<_, AgentSummary>(
        r#"
        SELECT project_id, agent_id, summary, history_json, message_count,
               summary_count, updated_at
        FROM agent_summaries
        WHERE project_id = ?
        ORDER BY agent_id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Count one more message for (project, agent). Creates the row on first
/// use. Returns the new count.
pub async fn increment_message_count(
    pool: &SqlitePool,
    project_id: i64,
    agent_id: i64,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO agent_summaries (project_id, agent_id, summary, message_count, summary_count)
        VALUES (?, ?, '', 1, 0)
        ON CONFLICT(project_id, agent_id) DO UPDATE SET
            message_count = agent_summaries.message_count + 1
        RETURNING message_count
        "#,
    )
    .bind(project_id)
    .bind(agent_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_project, test_db};

    #[tokio::test]
    async fn test_increment_then_upsert_resets_count() {
        let db = test_db().await;
        let (_, _, project_id, a, _) = seeded_project(&db).await;

        assert_eq!(increment_message_count(db.pool(), project_id, a).await.unwrap(), 1);
        assert_eq!(increment_message_count(db.pool(), project_id, a).await.unwrap(), 2);

        upsert_summary(db.pool(), project_id, a, "first summary", None)
            .await
            .unwrap();
        let row = get_summary(db.pool(), project_id, a).await.unwrap().unwrap();
        assert_eq!(row.summary, "first summary");
        assert_eq!(row.message_count, 0);
        assert_eq!(row.summary_count, 1);

        upsert_summary(db.pool(), project_id, a, "second summary", Some("[]"))
            .await
            .unwrap();
        let row = get_summary(db.pool(), project_id, a).await.unwrap().unwrap();
        assert_eq!(row.summary, "second summary");
        assert_eq!(row.summary_count, 2);
        assert_eq!(row.history_json.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_list_summaries_scoped_to_project() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;

        upsert_summary(db.pool(), project_id, a, "s-a", None).await.unwrap();
        upsert_summary(db.pool(), project_id, b, "s-b", None).await.unwrap();

        let rows = list_summaries(db.pool(), project_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(get_summary(db.pool(), project_id + 1, a).await.unwrap().is_none());
    }
}
