//! Worker nudge dispatch.
//!
//! A nudge asks the turn worker to drain a project's pending messages.
//! Delivery is a single fire-and-forget HTTP POST; the API never awaits
//! worker completion, and failures are logged rather than surfaced to the
//! caller. Serialization and coalescing happen worker-side.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NudgePayload {
    project_id: i64,
}

/// Dispatches nudges to the turn worker.
#[derive(Debug, Clone)]
pub struct Nudger {
    http: Client,
    brain_url: Option<String>,
}

impl Nudger {
    /// Create a dispatcher. With `brain_url` unset, nudges become no-ops
    /// (useful in tests and single-process setups without a worker).
    pub fn new(brain_url: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            // Builder only fails on TLS backend misconfiguration.
            .unwrap_or_default();

        Self { http, brain_url }
    }

    /// Request a run for a project. Returns immediately.
    pub fn nudge(&self, project_id: i64) {
        let Some(base_url) = self.brain_url.clone() else {
            debug!(project_id, "no worker configured, skipping nudge");
            return;
        };

        let http = self.http.clone();
        tokio::spawn(async move {
            let url = format!("{}/nudge-brain", base_url.trim_end_matches('/'));
            let result = http
                .post(&url)
                .json(&NudgePayload { project_id })
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(project_id, "nudged worker");
                }
                Ok(response) => {
                    warn!(project_id, status = %response.status(), "worker rejected nudge");
                }
                Err(err) => {
                    warn!(project_id, error = %err, "failed to nudge worker");
                }
            }
        });
    }
}
