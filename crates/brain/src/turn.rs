//! One turn: trigger → prompt → LLM → validate → persist.

use backend_client::NewAgentMessage;
use database::models::{Message, MessageStatus};
use llm::{ChatMessage, ChatRequest, LlmError};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::Result;
use crate::prompt;
use crate::reply;
use crate::runner::RunDeps;
use crate::summarizer;

/// How a turn ended, from the run loop's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply persisted; keep draining.
    Completed,
    /// Trigger marked failed; move on to the next pending message.
    Skipped,
    /// The project was paused; stop the run.
    Abort,
}

/// Process a single pending trigger.
pub async fn handle_trigger(
    deps: &RunDeps,
    ctx: &mut RunContext,
    trigger: &Message,
) -> Result<TurnOutcome> {
    let project_id = ctx.project.id;
    let responder_id = trigger.receiver_id;

    let Some(responder) = ctx.members.get(&responder_id) else {
        deps.api
            .pause_project(
                project_id,
                "agent-missing",
                &format!(
                    "Responding agent {} is not a member of the project. Pausing.",
                    responder_id
                ),
            )
            .await?;
        return Ok(TurnOutcome::Abort);
    };

    let allowed = responder.allowed_recipients();
    let window = deps.config.history_fetch_count(responder.message_count);
    let summary = responder.summary.clone();

    let mut history = deps
        .api
        .recent_agent_messages(project_id, responder_id, window)
        .await?;
    history.reverse();

    let mut messages =
        prompt::build_chat_prompt(ctx, responder_id, summary.as_deref(), &history, trigger);
    let model = ctx
        .model_for(responder_id, &deps.config.default_model)
        .to_string();

    info!(
        message_id = trigger.id,
        responder_id,
        history = history.len(),
        "handling trigger"
    );

    // Bounded attempt loop; validation failures inject a correction notice
    // and re-call, transport failures simply burn an attempt.
    let mut valid_reply = None;
    for attempt in 1..=deps.config.max_retries {
        let request = ChatRequest::new(model.clone(), messages.clone())
            .with_response_format(prompt::response_schema())
            .with_temperature(prompt::TURN_TEMPERATURE);

        match deps.llm.complete(&ctx.api_key, request).await {
            Ok(raw) => match reply::evaluate(&raw, &allowed, deps.config.max_message_length) {
                Ok(reply) => {
                    valid_reply = Some(reply);
                    break;
                }
                Err(fault) => {
                    warn!(
                        message_id = trigger.id,
                        attempt,
                        ?fault,
                        "reply failed validation, injecting correction"
                    );
                    messages.push(ChatMessage::system(fault.notice(&allowed)));
                }
            },
            Err(LlmError::Auth) => {
                deps.api
                    .pause_project(
                        project_id,
                        "invalid-api-key",
                        "The LLM provider rejected the project's API key. Pausing.",
                    )
                    .await?;
                return Ok(TurnOutcome::Abort);
            }
            Err(err) => {
                warn!(
                    message_id = trigger.id,
                    attempt,
                    error = %err,
                    "LLM call failed, counting as retry"
                );
            }
        }
    }

    let Some(reply) = valid_reply else {
        deps.api
            .update_message_status(trigger.id, MessageStatus::Failed)
            .await?;
        deps.api
            .create_log(
                Some(project_id),
                "error",
                Some("format-invalid"),
                &format!(
                    "Message {} failed all {} validation attempts; marked failed.",
                    trigger.id, deps.config.max_retries
                ),
            )
            .await?;
        return Ok(TurnOutcome::Skipped);
    };

    let Some(conversation_id) = ctx.conversation_id(responder_id, reply.recipient_id) else {
        deps.api
            .pause_project(
                project_id,
                "conversation-missing",
                &format!(
                    "No conversation exists between agents {} and {}. Pausing.",
                    responder_id, reply.recipient_id
                ),
            )
            .await?;
        return Ok(TurnOutcome::Abort);
    };

    deps.api
        .update_message_status(trigger.id, MessageStatus::Sent)
        .await?;
    deps.api
        .create_agent_message(&NewAgentMessage {
            conversation_id,
            project_id,
            sender_id: responder_id,
            receiver_id: reply.recipient_id,
            content: reply.body,
        })
        .await?;
    deps.api.decrement_limit(project_id).await?;

    let count = deps.api.increment_agent_count(project_id, responder_id).await?;
    if let Some(state) = ctx.members.get_mut(&responder_id) {
        state.message_count = count;
    }

    info!(
        message_id = trigger.id,
        responder_id,
        recipient_id = reply.recipient_id,
        "assistant reply persisted"
    );

    if count >= deps.config.summary_threshold {
        if let Err(err) = summarizer::summarize_agent(deps, ctx, responder_id).await {
            warn!(responder_id, error = %err, "summarization failed");
            let _ = deps
                .api
                .create_log(
                    Some(project_id),
                    "warn",
                    Some("summary-failed"),
                    &format!("Failed to summarize agent {}: {}", responder_id, err),
                )
                .await;
        }
    }

    Ok(TurnOutcome::Completed)
}
