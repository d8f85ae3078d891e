//! SQLite persistence layer for Parley.
//!
//! This crate provides async database operations for users, agents, tokens,
//! projects, conversations, messages, memory summaries and logs using SQLx
//! with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{user, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:parley.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let owner = user::create_user(db.pool(), "ada", "ada@example.com", "hash").await?;
//!     println!("created user {}", owner.id);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod context;
pub mod conversation;
pub mod error;
pub mod log;
pub mod member;
pub mod message;
pub mod models;
pub mod project;
pub mod summary;
pub mod token;
pub mod user;
pub mod validation;

pub use context::ProjectContext;
pub use error::{DatabaseError, Result};
pub use models::{
    Agent, AgentSummary, Conversation, Log, LogLevel, Message, MessageKind, MessageStatus,
    Project, ProjectMember, Token, User, SYSTEM_AGENT_ID,
};

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist, or
    /// `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {}", url);

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is
    /// up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh in-memory database with migrations applied.
    pub async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    /// A user, an active token and a running two-agent project with a
    /// conversation between the agents. Returns
    /// (user_id, token_id, project_id, agent_a, agent_b).
    pub async fn seeded_project(db: &Database) -> (i64, i64, i64, i64, i64) {
        let owner = user::create_user(db.pool(), "owner", "owner@example.com", "hash")
            .await
            .unwrap();
        let token = token::create_token(db.pool(), owner.id, "main", "aa:bb")
            .await
            .unwrap();
        let a = agent::create_agent(db.pool(), owner.id, "Ada", "planner", "Plans.", "gpt-4o")
            .await
            .unwrap();
        let b = agent::create_agent(db.pool(), owner.id, "Brel", "builder", "Builds.", "gpt-4o")
            .await
            .unwrap();

        let new_project = project::NewProject {
            user_id: owner.id,
            title: "demo".to_string(),
            description: String::new(),
            system_prompt: "Collaborate.".to_string(),
            token_id: Some(token.id),
            message_limit: 10,
            members: vec![
                project::NewMember {
                    agent_id: a.id,
                    role: None,
                    prompt: None,
                    can_message: vec![b.id],
                },
                project::NewMember {
                    agent_id: b.id,
                    role: None,
                    prompt: None,
                    can_message: vec![a.id],
                },
            ],
        };
        let created = project::create_project(db.pool(), new_project).await.unwrap();
        project::set_paused(db.pool(), created.id, false).await.unwrap();

        (owner.id, token.id, created.id, a.id, b.id)
    }
}
