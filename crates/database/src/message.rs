//! Message queries.
//!
//! Messages are append-only; only `status` ever changes. Inserts bump the
//! project's `last_activity_at` in the same transaction.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Message, MessageKind, MessageStatus};

/// A message to insert.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub project_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub kind: MessageKind,
    pub status: MessageStatus,
}

/// The oldest pending message of a project, with its age precomputed for
/// the watchdog's stall check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingAge {
    pub message_id: i64,
    pub created_at: String,
    pub age_seconds: i64,
}

/// Insert a message and bump the project's activity clock.
pub async fn create_message(pool: &SqlitePool, new: NewMessage) -> Result<Message> {
    let mut tx = pool.begin().await?;

    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (conversation_id, project_id, sender_id, receiver_id, content, type, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, conversation_id, project_id, sender_id, receiver_id,
                  content, type, status, created_at
        "#,
    )
    .bind(new.conversation_id)
    .bind(new.project_id)
    .bind(new.sender_id)
    .bind(new.receiver_id)
    .bind(&new.content)
    .bind(new.kind)
    .bind(new.status)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE projects SET last_activity_at = datetime('now') WHERE id = ?")
        .bind(new.project_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(message)
}

/// Get a message by id.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, project_id, sender_id, receiver_id,
               content, type, status, created_at
        FROM messages
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Message",
        id: id.to_string(),
    })
}

/// List a conversation's messages, oldest first.
pub async fn list_conversation_messages(
    pool: &SqlitePool,
    conversation_id: i64,
) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, project_id, sender_id, receiver_id,
               content, type, status, created_at
        FROM messages
        WHERE conversation_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// A project's pending messages, oldest first (ties broken by id).
pub async fn pending_queue(pool: &SqlitePool, project_id: i64) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, project_id, sender_id, receiver_id,
               content, type, status, created_at
        FROM messages
        WHERE project_id = ? AND status = 'pending'
        ORDER BY created_at, id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Transition a message's status. Returns the updated row.
pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    status: MessageStatus,
) -> Result<Message> {
    sqlx::query_as::<_, Message>(
        r#"
        UPDATE messages
        SET status = ?
        WHERE id = ?
        RETURNING id, conversation_id, project_id, sender_id, receiver_id,
                  content, type, status, created_at
        "#,
    )
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Message",
        id: id.to_string(),
    })
}

/// The oldest pending message of a project, if any, with its age.
pub async fn oldest_pending(pool: &SqlitePool, project_id: i64) -> Result<Option<PendingAge>> {
    let row = sqlx::query_as::<_, PendingAge>(
        r#"
        SELECT id AS message_id, created_at,
               CAST(strftime('%s', 'now') - strftime('%s', created_at) AS INTEGER)
                   AS age_seconds
        FROM messages
        WHERE project_id = ? AND status = 'pending'
        ORDER BY created_at, id
        LIMIT 1
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The last `limit` sent user/assistant messages involving an agent,
/// newest first. The prompt builder reverses these into chronological
/// order.
pub async fn recent_agent_messages(
    pool: &SqlitePool,
    project_id: i64,
    agent_id: i64,
    limit: i64,
) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, conversation_id, project_id, sender_id, receiver_id,
               content, type, status, created_at
        FROM messages
        WHERE project_id = ?
          AND status = 'sent'
          AND type IN ('user', 'assistant')
          AND (sender_id = ? OR receiver_id = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(project_id)
    .bind(agent_id)
    .bind(agent_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// The last `limit` messages across the whole project, newest first.
pub async fn recent_project_messages(
    pool: &SqlitePool,
    project_id: i64,
    limit: i64,
) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
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
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SYSTEM_AGENT_ID;
    use crate::test_support::{seeded_project, test_db};
    use crate::{conversation, project};

    async fn seed_message(
        db: &crate::Database,
        project_id: i64,
        conversation_id: i64,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
        status: MessageStatus,
    ) -> Message {
        create_message(
            db.pool(),
            NewMessage {
                conversation_id,
                project_id,
                sender_id,
                receiver_id,
                content: content.to_string(),
                kind: if sender_id == SYSTEM_AGENT_ID {
                    MessageKind::User
                } else {
                    MessageKind::Assistant
                },
                status,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_bumps_activity() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;
        let conv = conversation::find_by_pair(db.pool(), project_id, a, b)
            .await
            .unwrap()
            .unwrap();

        // Backdate the activity clock so the bump is observable.
        sqlx::query(
            "UPDATE projects SET last_activity_at = datetime('now', '-1 hour') WHERE id = ?",
        )
        .bind(project_id)
        .execute(db.pool())
        .await
        .unwrap();
        let before = project::get_project(db.pool(), project_id).await.unwrap();

        seed_message(&db, project_id, conv.id, SYSTEM_AGENT_ID, a, "kick", MessageStatus::Pending)
            .await;

        let after = project::get_project(db.pool(), project_id).await.unwrap();
        assert!(after.last_activity_at > before.last_activity_at);
    }

    #[tokio::test]
    async fn test_pending_queue_is_oldest_first() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;
        let conv = conversation::find_by_pair(db.pool(), project_id, a, b)
            .await
            .unwrap()
            .unwrap();

        let first =
            seed_message(&db, project_id, conv.id, SYSTEM_AGENT_ID, a, "one", MessageStatus::Pending)
                .await;
        let second =
            seed_message(&db, project_id, conv.id, SYSTEM_AGENT_ID, a, "two", MessageStatus::Pending)
                .await;

        let queue = pending_queue(db.pool(), project_id).await.unwrap();
        assert_eq!(
            queue.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );

        update_status(db.pool(), first.id, MessageStatus::Sent).await.unwrap();
        let queue = pending_queue(db.pool(), project_id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, second.id);
    }

    #[tokio::test]
    async fn test_oldest_pending_age() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;
        let conv = conversation::find_by_pair(db.pool(), project_id, a, b)
            .await
            .unwrap()
            .unwrap();

        assert!(oldest_pending(db.pool(), project_id).await.unwrap().is_none());

        let msg =
            seed_message(&db, project_id, conv.id, SYSTEM_AGENT_ID, a, "old", MessageStatus::Pending)
                .await;
        sqlx::query("UPDATE messages SET created_at = datetime('now', '-120 seconds') WHERE id = ?")
            .bind(msg.id)
            .execute(db.pool())
            .await
            .unwrap();

        let pending = oldest_pending(db.pool(), project_id).await.unwrap().unwrap();
        assert_eq!(pending.message_id, msg.id);
        assert!(pending.age_seconds >= 120);
    }

    #[tokio::test]
    async fn test_recent_agent_messages_filters_and_orders() {
        let db = test_db().await;
        let (_, _, project_id, a, b) = seeded_project(&db).await;
        let conv = conversation::find_by_pair(db.pool(), project_id, a, b)
            .await
            .unwrap()
            .unwrap();

        seed_message(&db, project_id, conv.id, a, b, "sent-1", MessageStatus::Sent).await;
        seed_message(&db, project_id, conv.id, b, a, "sent-2", MessageStatus::Sent).await;
        // Pending and failed messages never enter the window.
        seed_message(&db, project_id, conv.id, a, b, "pending", MessageStatus::Pending).await;
        seed_message(&db, project_id, conv.id, a, b, "failed", MessageStatus::Failed).await;

        let recent = recent_agent_messages(db.pool(), project_id, a, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "sent-2");
        assert_eq!(recent[1].content, "sent-1");
    }
}
