//! Conversation queries.
//!
//! Exactly one conversation exists per unordered agent pair per project;
//! the stored pair is always normalized to `sender_id <= receiver_id`.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{conversation_pair, Conversation};

/// Get a conversation by id.
pub async fn get_conversation(pool: &SqlitePool, id: i64) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, project_id, sender_id, receiver_id, created_at
        FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Conversation",
        id: id.to_string(),
    })
}

/// List a project's conversations.
pub async fn list_conversations(pool: &SqlitePool, project_id: i64) -> Result<Vec<Conversation>> {
    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, project_id, sender_id, receiver_id, created_at
        FROM conversations
        WHERE project_id = ?
        ORDER BY id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(conversations)
}

/// Find the conversation for an unordered pair.
pub async fn find_by_pair(
    pool: &SqlitePool,
    project_id: i64,
    a: i64,
    b: i64,
) -> Result<Option<Conversation>> {
    let (sender_id, receiver_id) = conversation_pair(a, b);

    let conversation = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, project_id, sender_id, receiver_id, created_at
        FROM conversations
        WHERE project_id = ? AND sender_id = ? AND receiver_id = ?
        "#,
    )
    .bind(project_id)
    .bind(sender_id)
    .bind(receiver_id)
    .fetch_optional(pool)
    .await?;

    Ok(conversation)
}

/// Get or create the conversation for an unordered pair.
pub async fn get_or_create(
    pool: &SqlitePool,
    project_id: i64,
    a: i64,
    b: i64,
) -> Result<Conversation> {
    if let Some(existing) = find_by_pair(pool, project_id, a, b).await? {
        return Ok(existing);
    }

    let (sender_id, receiver_id) = conversation_pair(a, b);

    let inserted = sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (project_id, sender_id, receiver_id)
        VALUES (?, ?, ?)
        RETURNING id, project_id, sender_id, receiver_id, created_at
        "#,
    )
    .bind(project_id)
    .bind(sender_id)
    .bind(receiver_id)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(conversation) => Ok(conversation),
        // Lost a race to a concurrent insert; the row exists now.
        Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
            find_by_pair(pool, project_id, a, b)
                .await?
                .ok_or(DatabaseError::NotFound {
                    entity: "Conversation",
                    id: format!("{}:{}-{}", project_id, sender_id, receiver_id),
                })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_project, test_db};
    use crate::models::SYSTEM_AGENT_ID;

    #[tokio::test]
    async fn test_get_or_create_normalizes_and_dedupes() {
        let db = test_db().await;
        let (_, _, project_id, a, _) = seeded_project(&db).await;
        let seeded = list_conversations(db.pool(), project_id).await.unwrap().len();

        let first = get_or_create(db.pool(), project_id, a, SYSTEM_AGENT_ID)
            .await
            .unwrap();
        assert_eq!((first.sender_id, first.receiver_id), (SYSTEM_AGENT_ID, a));

        let second = get_or_create(db.pool(), project_id, SYSTEM_AGENT_ID, a)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);

        // The pair already existed from project creation; nothing new.
        let all = list_conversations(db.pool(), project_id).await.unwrap();
        assert_eq!(all.len(), seeded);
    }
}
