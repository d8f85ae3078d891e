//! Per-project run loop.
//!
//! A run drains everything pending for one project: fetch the context
//! snapshot once, then process triggers one turn at a time, re-checking
//! the project flags between turns so a pause (manual, budget or
//! watchdog) terminates the run at the next check.

use std::sync::Arc;

use backend_client::BackendClient;
use crypto::TokenCipher;
use llm::ChatCompleter;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::context::{ContextFault, RunContext};
use crate::error::Result;
use crate::turn::{self, TurnOutcome};

/// Everything a run needs, shared across runs.
pub struct RunDeps {
    pub api: BackendClient,
    pub llm: Arc<dyn ChatCompleter>,
    pub cipher: TokenCipher,
    pub config: WorkerConfig,
}

/// Process everything pending for a project. Never panics the nudge task:
/// errors escaping the loop are contained and persisted as a `run-crash`
/// log, leaving triggers pending so the next nudge retries them.
pub async fn run_project(deps: &RunDeps, project_id: i64) {
    info!(project_id, "run starting");

    match run_inner(deps, project_id).await {
        Ok(()) => info!(project_id, "run finished"),
        Err(err) => {
            error!(project_id, error = %err, "run crashed");
            let logged = deps
                .api
                .create_log(
                    Some(project_id),
                    "error",
                    Some("run-crash"),
                    &format!("Critical error in run: {}", err),
                )
                .await;
            if let Err(log_err) = logged {
                error!(project_id, error = %log_err, "failed to persist run-crash log");
            }
        }
    }
}

async fn run_inner(deps: &RunDeps, project_id: i64) -> Result<()> {
    let snapshot = match deps.api.get_context(project_id).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(project_id, error = %err, "could not fetch project context");
            let _ = deps
                .api
                .create_log(
                    Some(project_id),
                    "warn",
                    Some("context-fetch-failed"),
                    "Run aborted: could not fetch project context.",
                )
                .await;
            return Ok(());
        }
    };

    let mut ctx = match RunContext::build(snapshot, &deps.cipher) {
        Ok(ctx) => ctx,
        Err(ContextFault::TokenMissing) => {
            deps.api
                .pause_project(
                    project_id,
                    "token-inactive",
                    "No API token is bound to the project. Pausing.",
                )
                .await?;
            return Ok(());
        }
        Err(ContextFault::TokenInactive) => {
            deps.api
                .pause_project(
                    project_id,
                    "token-inactive",
                    "The bound API token is disabled. Pausing.",
                )
                .await?;
            return Ok(());
        }
        Err(ContextFault::DecryptFailed(err)) => {
            deps.api
                .pause_project(
                    project_id,
                    "decrypt-failed",
                    &format!("Failed to decrypt the bound API token: {}. Pausing.", err),
                )
                .await?;
            return Ok(());
        }
    };

    let mut iteration: u32 = 0;
    loop {
        iteration += 1;
        if iteration > deps.config.max_iterations {
            warn!(project_id, "max iterations reached, bailing out");
            deps.api
                .create_log(
                    Some(project_id),
                    "warn",
                    Some("max-iterations"),
                    &format!(
                        "Run processed {} turns without draining the queue. Exiting.",
                        deps.config.max_iterations
                    ),
                )
                .await?;
            break;
        }

        // Loop guard: a pause from any side ends the run here.
        let flags = deps.api.project_flags(project_id).await?;
        if flags.paused {
            info!(project_id, "project paused, run terminating");
            break;
        }
        if !flags.token_active {
            warn!(project_id, "token inactive mid-run, pausing");
            deps.api
                .pause_project(
                    project_id,
                    "token-inactive",
                    "The bound API token became inactive mid-run. Pausing.",
                )
                .await?;
            break;
        }
        if flags.message_limit <= 0 {
            info!(project_id, "message budget exhausted, run terminating");
            break;
        }

        let pending = deps.api.pending_queue(project_id).await?;
        let Some(trigger) = pending.into_iter().next() else {
            info!(project_id, iteration, "no pending messages left");
            break;
        };

        match turn::handle_trigger(deps, &mut ctx, &trigger).await? {
            TurnOutcome::Abort => break,
            TurnOutcome::Completed | TurnOutcome::Skipped => {}
        }
    }

    Ok(())
}
