//! Prompt assembly for agent turns and memory summarization.

use llm::ChatMessage;

use database::models::{Message, SYSTEM_AGENT_ID};

use crate::context::RunContext;

/// Tag separating project instructions from the agent's own role prompt.
pub const AGENT_ROLE_TAG: &str = "[AGENT ROLE]";

/// Strict reply format appended to every main system prompt.
pub const FORMAT_RULES: &str = r#"Respond using this strict JSON format:
{
  "recipient_id": <agent id>,
  "body": "<message content>"
}
Rules:
- Return a single raw JSON object
- No markdown, comments, or extra formatting
- The object must be valid JSON"#;

/// System prompt for memory summarization.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an AI summarizer. Summarize the following \
conversation/messages as a task-focused memory. Retain key facts, decisions, and outcomes. \
Do not add interpretations or analysis. Be concise, clear, and specific.";

/// Completion budget for summaries.
pub const MAX_SUMMARY_TOKENS: u32 = 512;

/// Sampling temperature for agent turns.
pub const TURN_TEMPERATURE: f32 = 0.7;

/// Sampling temperature for summarization.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// `response_format` payload enforcing the agent reply schema.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "agent_reply",
            "description": "Structured reply from the agent, adhering to the specified JSON format.",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "recipient_id": {
                        "type": "integer",
                        "description": "Id of the agent intended to receive the message."
                    },
                    "body": {
                        "type": "string",
                        "description": "The main content of the message."
                    },
                    "thinking": {
                        "type": "string",
                        "description": "Optional private reasoning; not delivered."
                    }
                },
                "required": ["recipient_id", "body"],
                "additionalProperties": false
            }
        }
    })
}

/// `[FROM: X TO: Y] content` formatting shared by history entries and
/// triggers.
pub fn format_message_content(ctx: &RunContext, message: &Message) -> String {
    format!(
        "[FROM: {} TO: {}] {}",
        ctx.agent_name(message.sender_id),
        ctx.agent_name(message.receiver_id),
        message.content.trim()
    )
}

/// Main system prompt: project instructions, the reply format rules, the
/// recipient roster and the agent's role prompt.
pub fn build_main_system_prompt(ctx: &RunContext, agent_id: i64) -> String {
    let member = ctx.members.get(&agent_id);
    let agent_prompt = member.map(|m| m.member.prompt.as_str()).unwrap_or_default();

    let mut roster: Vec<String> = member
        .map(|m| {
            m.member
                .can_message
                .iter()
                .map(|&id| format!("{} (id {})", ctx.agent_name(id), id))
                .collect()
        })
        .unwrap_or_default();
    roster.push(format!("System (id {})", SYSTEM_AGENT_ID));

    format!(
        "{}\n\n{}\n\nYou are {} (id {}). You may send messages to: {}.\n\n{}\n{}",
        ctx.project.system_prompt.trim(),
        FORMAT_RULES,
        ctx.agent_name(agent_id),
        agent_id,
        roster.join(", "),
        AGENT_ROLE_TAG,
        agent_prompt.trim()
    )
}

/// System entry carrying the agent's long-term memory.
pub fn build_summary_context_prompt(summary_text: &str) -> String {
    format!(
        "Here's a summary of the conversation so far:\n{}",
        summary_text.trim()
    )
}

/// Full chat prompt for one turn.
///
/// `history` must be in chronological order (oldest first); entries are
/// role-tagged from the responding agent's perspective - its own past
/// messages become `assistant`, everything else `user`.
pub fn build_chat_prompt(
    ctx: &RunContext,
    agent_id: i64,
    summary: Option<&str>,
    history: &[Message],
    trigger: &Message,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);

    messages.push(ChatMessage::system(build_main_system_prompt(ctx, agent_id)));

    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(build_summary_context_prompt(summary)));
    }

    for entry in history {
        let content = format_message_content(ctx, entry);
        if entry.sender_id == agent_id {
            messages.push(ChatMessage::assistant(content));
        } else {
            messages.push(ChatMessage::user(content));
        }
    }

    messages.push(ChatMessage::user(format_message_content(ctx, trigger)));

    messages
}

/// Prompt pair for condensing an agent's recent messages into a summary.
pub fn build_summary_prompt(ctx: &RunContext, history: &[Message]) -> Vec<ChatMessage> {
    let extract = history
        .iter()
        .map(|m| {
            format!(
                "[{} to {}]: {}",
                ctx.agent_name(m.sender_id),
                ctx.agent_name(m.receiver_id),
                m.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Please summarize the following conversation extract:\n\n{}",
            extract
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::test_context;
    use database::models::{MessageKind, MessageStatus};

    fn message(id: i64, sender_id: i64, receiver_id: i64, content: &str) -> Message {
        Message {
            id,
            conversation_id: 1,
            project_id: 100,
            sender_id,
            receiver_id,
            content: content.to_string(),
            kind: MessageKind::Assistant,
            status: MessageStatus::Sent,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_main_system_prompt_sections() {
        let ctx = test_context();
        let prompt = build_main_system_prompt(&ctx, 1);

        assert!(prompt.starts_with("Collaborate."));
        assert!(prompt.contains(FORMAT_RULES));
        assert!(prompt.contains("You are Ada (id 1)"));
        assert!(prompt.contains("Brel (id 2)"));
        assert!(prompt.contains("System (id 0)"));
        assert!(prompt.contains(AGENT_ROLE_TAG));
        assert!(prompt.ends_with("Plans."));
    }

    #[test]
    fn test_chat_prompt_order_and_perspective() {
        let ctx = test_context();
        let history = vec![
            message(10, 2, 1, "from Brel"),
            message(11, 1, 2, "from Ada"),
        ];
        let trigger = message(12, 0, 1, "kickoff");

        let prompt = build_chat_prompt(&ctx, 1, Some("Ada met Brel."), &history, &trigger);

        assert_eq!(prompt.len(), 5);
        assert_eq!(prompt[0].role, "system");
        assert_eq!(prompt[1].role, "system");
        assert!(prompt[1].content.contains("Ada met Brel."));
        // Received message reads as user, own message as assistant.
        assert_eq!(prompt[2].role, "user");
        assert!(prompt[2].content.contains("[FROM: Brel TO: Ada]"));
        assert_eq!(prompt[3].role, "assistant");
        // Trigger last, tagged user, System resolved by name.
        assert_eq!(prompt[4].role, "user");
        assert!(prompt[4].content.contains("[FROM: System TO: Ada] kickoff"));
    }

    #[test]
    fn test_empty_summary_is_skipped() {
        let ctx = test_context();
        let trigger = message(12, 0, 1, "kickoff");

        let prompt = build_chat_prompt(&ctx, 1, Some("   "), &[], &trigger);
        assert_eq!(prompt.len(), 2);

        let prompt = build_chat_prompt(&ctx, 1, None, &[], &trigger);
        assert_eq!(prompt.len(), 2);
    }

    #[test]
    fn test_summary_prompt_format() {
        let ctx = test_context();
        let history = vec![message(10, 1, 2, "we agreed on X")];

        let prompt = build_summary_prompt(&ctx, &history);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, "system");
        assert_eq!(prompt[0].content, SUMMARY_SYSTEM_PROMPT);
        assert!(prompt[1].content.contains("[Ada to Brel]: we agreed on X"));
    }

    #[test]
    fn test_response_schema_requires_exact_fields() {
        let schema = response_schema();
        let required = &schema["json_schema"]["schema"]["required"];
        assert_eq!(required[0], "recipient_id");
        assert_eq!(required[1], "body");
        assert_eq!(
            schema["json_schema"]["schema"]["additionalProperties"],
            false
        );
    }
}
