//! Parley turn worker.
//!
//! Listens for nudges from the API service and drains the nudged
//! project's pending messages: build prompts, call the LLM, validate the
//! structured reply, persist it through the internal surface and update
//! agent memory. At most one run is active per project; overlapping
//! nudges coalesce into the active run's re-check flag.

mod config;
mod context;
mod dispatch;
mod error;
mod prompt;
mod reply;
mod runner;
mod summarizer;
mod turn;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use backend_client::BackendClient;
use crypto::TokenCipher;
use llm::OpenAiChat;
use serde::Deserialize;
use tracing::info;

use crate::config::WorkerConfig;
use crate::dispatch::RunLocks;
use crate::runner::RunDeps;

#[derive(Clone)]
struct WorkerState {
    locks: Arc<RunLocks>,
    deps: Arc<RunDeps>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NudgePayload {
    #[serde(alias = "project_id")]
    project_id: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = WorkerConfig::from_env()?;
    info!(addr = %config.addr, "Starting turn worker");

    let api = BackendClient::new(&config.backend_api_url, &config.brain_api_key)?;
    let llm = OpenAiChat::new(&config.llm_api_url, config.llm_timeout)?;
    let cipher = TokenCipher::new(&config.encrypt_secret)?;

    let addr = config.addr;
    let state = WorkerState {
        locks: Arc::new(RunLocks::new()),
        deps: Arc::new(RunDeps {
            api,
            llm: Arc::new(llm),
            cipher,
            config,
        }),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/nudge-brain", post(nudge))
        .with_state(state);

    info!(addr = %addr, "Turn worker listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "turn worker is running" }))
}

/// `POST /nudge-brain` - request a run for a project.
///
/// Returns immediately: the run happens on a background task. A nudge for
/// a project with an active run coalesces into its re-check flag.
async fn nudge(
    State(state): State<WorkerState>,
    Json(payload): Json<NudgePayload>,
) -> Json<serde_json::Value> {
    let project_id = payload.project_id;
    let slot = state.locks.slot(project_id);

    if !slot.try_acquire() {
        slot.request_recheck();
        info!(project_id, "run already active, nudge coalesced");
        return Json(serde_json::json!({ "status": "coalesced" }));
    }

    let deps = state.deps.clone();
    tokio::spawn(async move {
        loop {
            runner::run_project(&deps, project_id).await;

            // Drain again when a nudge landed mid-run; release() recovers
            // the window between the last check and the slot going free.
            if slot.take_recheck() {
                continue;
            }
            if slot.release() {
                continue;
            }
            break;
        }
    });

    Json(serde_json::json!({ "status": "queued" }))
}
