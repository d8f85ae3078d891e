//! Persistent project logs.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{Log, LogLevel};

/// Append a log entry. `project_id` is `None` for service-level entries.
pub async fn append_log(
    pool: &SqlitePool,
    project_id: Option<i64>,
    level: LogLevel,
    code: Option<&str>,
    message: &str,
) -> Result<Log> {
    let log = sqlx::query_as::<_, Log>(
        r#"
        INSERT INTO logs (project_id, level, code, message)
        VALUES (?, ?, ?, ?)
        RETURNING id, project_id, level, code, message, created_at
        "#,
    )
    .bind(project_id)
    .bind(level)
    .bind(code)
    .bind(message)
    .fetch_one(pool)
    .await?;

    Ok(log)
}

/// List a project's logs, newest first.
pub async fn list_logs(pool: &SqlitePool, project_id: i64) -> Result<Vec<Log>> {
    let logs = sqlx::query_as::<_, Log>(
        r#"
        SELECT id, project_id, level, code, message, created_at
        FROM logs
        WHERE project_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

/// Delete all logs of a project. Returns how many were removed.
pub async fn clear_logs(pool: &SqlitePool, project_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM logs WHERE project_id = ?")
        .bind(project_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_project, test_db};

    #[tokio::test]
    async fn test_append_list_clear() {
        let db = test_db().await;
        let (_, _, project_id, _, _) = seeded_project(&db).await;

        append_log(db.pool(), Some(project_id), LogLevel::Info, None, "started")
            .await
            .unwrap();
        append_log(
            db.pool(),
            Some(project_id),
            LogLevel::Error,
            Some("format-invalid"),
            "reply rejected",
        )
        .await
        .unwrap();

        let logs = list_logs(db.pool(), project_id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].code.as_deref(), Some("format-invalid"));

        let removed = clear_logs(db.pool(), project_id).await.unwrap();
        assert_eq!(removed, 2);
        assert!(list_logs(db.pool(), project_id).await.unwrap().is_empty());
    }
}
