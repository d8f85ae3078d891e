//! User CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::User;

/// Create a new user. The email must be unique.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES (?, ?, ?)
        RETURNING id, username, email, password_hash, created_at
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "User",
                    id: email.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })
}

/// Get a user by id.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Delete a user. Cascades to their agents, tokens and projects.
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    #[tokio::test]
    async fn test_user_crud() {
        let db = test_db().await;

        let user = create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();
        assert_eq!(user.username, "ada");

        let fetched = get_user(db.pool(), user.id).await.unwrap();
        assert_eq!(fetched.email, "ada@example.com");

        let by_email = get_user_by_email(db.pool(), "ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(get_user_by_email(db.pool(), "nobody@example.com")
            .await
            .unwrap()
            .is_none());

        delete_user(db.pool(), user.id).await.unwrap();
        assert!(matches!(
            get_user(db.pool(), user.id).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = test_db().await;

        create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();
        let result = create_user(db.pool(), "other", "ada@example.com", "hash").await;

        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));
    }
}
