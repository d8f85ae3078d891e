//! Token CRUD operations.
//!
//! Secrets arrive here already encrypted (`iv_hex:data_hex`); this module
//! never sees plaintext key material.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Token;

/// Store a new (already encrypted) token.
pub async fn create_token(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    encrypted_secret: &str,
) -> Result<Token> {
    let token = sqlx::query_as::<_, Token>(
        r#"
        INSERT INTO tokens (user_id, name, encrypted_secret)
        VALUES (?, ?, ?)
        RETURNING id, user_id, name, encrypted_secret, active, created_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(encrypted_secret)
    .fetch_one(pool)
    .await?;

    Ok(token)
}

/// Get a token by id.
pub async fn get_token(pool: &SqlitePool, id: i64) -> Result<Token> {
    sqlx::query_as::<_, Token>(
        r#"
        SELECT id, user_id, name, encrypted_secret, active, created_at
        FROM tokens
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Token",
        id: id.to_string(),
    })
}

/// List a user's tokens, oldest first.
pub async fn list_tokens(pool: &SqlitePool, user_id: i64) -> Result<Vec<Token>> {
    let tokens = sqlx::query_as::<_, Token>(
        r#"
        SELECT id, user_id, name, encrypted_secret, active, created_at
        FROM tokens
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(tokens)
}

/// Enable or disable a token.
pub async fn set_token_active(pool: &SqlitePool, id: i64, active: bool) -> Result<Token> {
    sqlx::query_as::<_, Token>(
        r#"
        UPDATE tokens
        SET active = ?
        WHERE id = ?
        RETURNING id, user_id, name, encrypted_secret, active, created_at
        "#,
    )
    .bind(active)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Token",
        id: id.to_string(),
    })
}

/// Delete a token. Refused while any project references it; the project
/// binding survives a forced cascade (user deletion) as "unbound" via the
/// `ON DELETE SET NULL` foreign key.
pub async fn delete_token(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let references: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE token_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    if references > 0 {
        return Err(DatabaseError::InUse {
            entity: "Token",
            id: id.to_string(),
        });
    }

    let result = sqlx::query("DELETE FROM tokens WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Token",
            id: id.to_string(),
        });
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_project, test_db};
    use crate::user;

    #[tokio::test]
    async fn test_token_crud() {
        let db = test_db().await;
        let owner = user::create_user(db.pool(), "ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let token = create_token(db.pool(), owner.id, "main", "aa:bb").await.unwrap();
        assert!(token.active);

        let disabled = set_token_active(db.pool(), token.id, false).await.unwrap();
        assert!(!disabled.active);

        delete_token(db.pool(), token.id).await.unwrap();
        assert!(matches!(
            get_token(db.pool(), token.id).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_refused_while_bound() {
        let db = test_db().await;
        let (_, token_id, _, _, _) = seeded_project(&db).await;

        let result = delete_token(db.pool(), token_id).await;
        assert!(matches!(result, Err(DatabaseError::InUse { .. })));

        // Still present.
        get_token(db.pool(), token_id).await.unwrap();
    }
}
