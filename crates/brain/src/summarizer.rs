//! Long-term memory summarization.
//!
//! When an agent's per-project message count reaches the configured
//! threshold, its recent messages are condensed into a third-person
//! summary and upserted. Failures are logged by the caller and never
//! abort the run.

use llm::ChatRequest;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::error::Result;
use crate::prompt;
use crate::runner::RunDeps;

/// Condense and persist an agent's recent memory.
pub async fn summarize_agent(deps: &RunDeps, ctx: &mut RunContext, agent_id: i64) -> Result<()> {
    let project_id = ctx.project.id;
    debug!(project_id, agent_id, "summarizing agent memory");

    let mut recent = deps
        .api
        .recent_agent_messages(project_id, agent_id, deps.config.summary_window)
        .await?;
    recent.reverse();

    if recent.is_empty() {
        warn!(project_id, agent_id, "no recent messages to summarize");
        return Ok(());
    }

    let messages = prompt::build_summary_prompt(ctx, &recent);
    let request = ChatRequest::new(deps.config.default_model.clone(), messages)
        .with_temperature(prompt::SUMMARY_TEMPERATURE)
        .with_max_tokens(prompt::MAX_SUMMARY_TOKENS);

    let summary = deps.llm.complete(&ctx.api_key, request).await?;
    let summary = summary.trim().to_string();

    if summary.is_empty() {
        warn!(project_id, agent_id, "summarization returned an empty result");
        return Ok(());
    }

    // Snapshot of the condensed source messages travels with the summary.
    let history_json = serde_json::to_string(&recent)?;
    deps.api
        .upsert_summary(project_id, agent_id, &summary, Some(&history_json))
        .await?;

    if let Some(state) = ctx.members.get_mut(&agent_id) {
        state.summary = Some(summary);
        state.message_count = 0;
    }

    debug!(project_id, agent_id, "summary saved");
    Ok(())
}
