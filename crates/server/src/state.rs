//! Application state shared across handlers.

use std::sync::Arc;

use crypto::{SessionSigner, TokenCipher};
use database::Database;
use hub::Hub;

use crate::config::Config;
use crate::nudge::Nudger;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Live-update hub.
    pub hub: Arc<Hub>,
    /// Service configuration.
    pub config: Arc<Config>,
    /// Token secret cipher.
    pub cipher: TokenCipher,
    /// Session cookie signer.
    pub sessions: SessionSigner,
    /// Worker nudge dispatcher.
    pub nudger: Nudger,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        db: Database,
        hub: Arc<Hub>,
        config: Arc<Config>,
        cipher: TokenCipher,
        sessions: SessionSigner,
        nudger: Nudger,
    ) -> Self {
        Self {
            db,
            hub,
            config,
            cipher,
            sessions,
            nudger,
        }
    }
}
