//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Record is referenced by other rows and cannot be removed
    #[error("{entity} is in use: {id}")]
    InUse { entity: &'static str, id: String },

    /// Stored value failed to decode (e.g. malformed can_message JSON)
    #[error("corrupt column {column}: {reason}")]
    Corrupt { column: &'static str, reason: String },
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
