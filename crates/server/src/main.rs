//! Parley API service.
//!
//! Owns all writes to the store, exposes the user-facing REST surface and
//! the internal surface for the turn worker and watchdog, runs the
//! live-update hub, and nudges the worker when new work arrives.

mod config;
mod error;
mod nudge;
mod routes;
mod session;
mod state;
mod ws;

use std::sync::Arc;

use crypto::{SessionSigner, TokenCipher};
use database::Database;
use hub::Hub;
use tracing::info;

use crate::config::Config;
use crate::nudge::Nudger;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting API service");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let cipher = TokenCipher::new(&config.encrypt_secret)?;
    let sessions = SessionSigner::new(&config.session_key);
    let nudger = Nudger::new(config.brain_url.clone());

    // Build application state
    let state = AppState::new(
        db,
        Arc::new(Hub::new()),
        Arc::new(config.clone()),
        cipher,
        sessions,
        nudger,
    );

    // Build router
    let app = routes::router(state);

    // Start server
    info!(addr = %config.addr, "API service listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
