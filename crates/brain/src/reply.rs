//! Parsing and validation of structured agent replies.
//!
//! A valid reply is a single JSON object `{"recipient_id": <id>, "body":
//! <text>}`; an optional `thinking` string is accepted and ignored by the
//! rest of the pipeline. Both snake_case and camelCase key spellings are
//! accepted.

use std::collections::BTreeSet;

use serde::Deserialize;

use database::SYSTEM_AGENT_ID;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReply {
    #[serde(alias = "recipientId")]
    recipient_id: Option<i64>,
    body: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    thinking: Option<String>,
}

/// A validated agent reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub recipient_id: i64,
    pub body: String,
}

/// Why a reply was rejected. Each fault maps to a correction notice
/// injected before the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyFault {
    /// Not parseable as the required JSON object.
    InvalidJson,
    /// Parseable but missing `recipient_id` or `body`.
    MissingField(&'static str),
    /// `recipient_id` is not an agent the sender may address.
    InvalidRecipient(i64),
    /// `body` is empty or whitespace.
    EmptyBody,
    /// `body` exceeds the configured maximum.
    TooLong { length: usize, max: usize },
}

impl ReplyFault {
    /// Correction notice injected as a `system` entry before the retry.
    /// `allowed` lists the recipient ids the sender may use.
    pub fn notice(&self, allowed: &BTreeSet<i64>) -> String {
        let valid_ids = allowed
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        match self {
            ReplyFault::InvalidJson | ReplyFault::MissingField(_) => concat!(
                "Your previous message was not valid JSON and did not match the required format.\n\n",
                "Please reply using **exactly** this structure (as a real JSON object):\n\n",
                "{\n",
                "  \"recipient_id\": <agent id>,\n",
                "  \"body\": \"Your message content\"\n",
                "}\n\n",
                "- Do not include Markdown or code blocks\n",
                "- Only return one JSON object — nothing else\n",
                "- Avoid extra text or formatting"
            )
            .to_string(),
            ReplyFault::InvalidRecipient(id) => format!(
                "[SYSTEM CORRECTION]: Your previous message addressed an invalid agent.\n\
                 Invalid recipient_id detected: {}\n\
                 Choose recipient_id from the agents you may address: {}.\n\
                 Resubmit your JSON response with a valid recipient_id.",
                id, valid_ids
            ),
            ReplyFault::EmptyBody => {
                "[SYSTEM CORRECTION]: Your previous message had an empty body. \
                 Resubmit your JSON response with non-empty message content in \"body\"."
                    .to_string()
            }
            ReplyFault::TooLong { length, max } => format!(
                "[SYSTEM CORRECTION]: Your previous message body was {} characters; \
                 the maximum is {}. Resubmit a shorter message.",
                length, max
            ),
        }
    }
}

/// Parse and validate a raw assistant reply.
///
/// `allowed` is the sender's permitted recipient set; the System agent is
/// always permitted.
pub fn evaluate(
    raw: &str,
    allowed: &BTreeSet<i64>,
    max_length: usize,
) -> Result<AgentReply, ReplyFault> {
    let parsed: RawReply = serde_json::from_str(raw.trim()).map_err(|_| ReplyFault::InvalidJson)?;

    let recipient_id = parsed
        .recipient_id
        .ok_or(ReplyFault::MissingField("recipient_id"))?;
    let body = parsed.body.ok_or(ReplyFault::MissingField("body"))?;

    if recipient_id != SYSTEM_AGENT_ID && !allowed.contains(&recipient_id) {
        return Err(ReplyFault::InvalidRecipient(recipient_id));
    }

    let body = body.trim().to_string();
    if body.is_empty() {
        return Err(ReplyFault::EmptyBody);
    }
    if body.len() > max_length {
        return Err(ReplyFault::TooLong {
            length: body.len(),
            max: max_length,
        });
    }

    Ok(AgentReply { recipient_id, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> BTreeSet<i64> {
        [2, 3].into_iter().collect()
    }

    #[test]
    fn test_valid_reply() {
        let reply = evaluate(
            r#"{"recipient_id": 2, "body": "On it.", "thinking": "hmm"}"#,
            &allowed(),
            2000,
        )
        .unwrap();
        assert_eq!(reply.recipient_id, 2);
        assert_eq!(reply.body, "On it.");
    }

    #[test]
    fn test_camel_case_keys_accepted() {
        let reply = evaluate(r#"{"recipientId": 3, "body": "ok"}"#, &allowed(), 2000).unwrap();
        assert_eq!(reply.recipient_id, 3);
    }

    #[test]
    fn test_system_always_addressable() {
        let reply = evaluate(r#"{"recipient_id": 0, "body": "done"}"#, &allowed(), 2000).unwrap();
        assert_eq!(reply.recipient_id, 0);
    }

    #[test]
    fn test_invalid_json() {
        assert_eq!(
            evaluate("not json at all", &allowed(), 2000),
            Err(ReplyFault::InvalidJson)
        );
        // Markdown fences around the object are still invalid.
        assert_eq!(
            evaluate("```json\n{\"recipient_id\": 2, \"body\": \"x\"}\n```", &allowed(), 2000),
            Err(ReplyFault::InvalidJson)
        );
        // Unknown fields are rejected, not silently dropped.
        assert_eq!(
            evaluate(r#"{"recipient_id": 2, "body": "x", "extra": 1}"#, &allowed(), 2000),
            Err(ReplyFault::InvalidJson)
        );
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            evaluate(r#"{"body": "x"}"#, &allowed(), 2000),
            Err(ReplyFault::MissingField("recipient_id"))
        );
        assert_eq!(
            evaluate(r#"{"recipient_id": 2}"#, &allowed(), 2000),
            Err(ReplyFault::MissingField("body"))
        );
    }

    #[test]
    fn test_recipient_and_body_constraints() {
        assert_eq!(
            evaluate(r#"{"recipient_id": 9, "body": "x"}"#, &allowed(), 2000),
            Err(ReplyFault::InvalidRecipient(9))
        );
        assert_eq!(
            evaluate(r#"{"recipient_id": 2, "body": "   "}"#, &allowed(), 2000),
            Err(ReplyFault::EmptyBody)
        );
        assert!(matches!(
            evaluate(
                &format!(r#"{{"recipient_id": 2, "body": "{}"}}"#, "x".repeat(50)),
                &allowed(),
                10,
            ),
            Err(ReplyFault::TooLong { length: 50, max: 10 })
        ));
    }

    #[test]
    fn test_notices_name_the_constraint() {
        let allowed = allowed();
        assert!(ReplyFault::InvalidJson.notice(&allowed).contains("recipient_id"));
        assert!(ReplyFault::InvalidRecipient(9)
            .notice(&allowed)
            .contains("2, 3"));
        assert!(ReplyFault::TooLong { length: 5000, max: 2000 }
            .notice(&allowed)
            .contains("2000"));
    }
}
