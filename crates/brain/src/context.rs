//! In-memory run context built from the project snapshot.

use std::collections::{BTreeSet, HashMap};

use crypto::TokenCipher;
use database::context::ProjectContext;
use database::models::{conversation_pair, Project, ProjectMember, SYSTEM_AGENT_ID};

/// Per-agent state tracked across one run.
#[derive(Debug, Clone)]
pub struct MemberState {
    pub member: ProjectMember,
    /// Latest long-term memory summary, if any.
    pub summary: Option<String>,
    /// Messages sent since the last summarization.
    pub message_count: i64,
}

impl MemberState {
    /// Recipients this member may address (the System agent is implicit).
    pub fn allowed_recipients(&self) -> BTreeSet<i64> {
        self.member.can_message.iter().copied().collect()
    }
}

/// Why a run context could not be assembled.
#[derive(Debug)]
pub enum ContextFault {
    /// No token bound to the project.
    TokenMissing,
    /// Bound token has been disabled.
    TokenInactive,
    /// Bound token failed to decrypt.
    DecryptFailed(crypto::CryptoError),
}

/// Everything one run needs, indexed for constant-time lookups.
#[derive(Debug)]
pub struct RunContext {
    pub project: Project,
    /// Decrypted LLM API key.
    pub api_key: String,
    pub members: HashMap<i64, MemberState>,
    conversations: HashMap<(i64, i64), i64>,
}

impl RunContext {
    /// Index the snapshot and decrypt the bound token.
    pub fn build(snapshot: ProjectContext, cipher: &TokenCipher) -> Result<Self, ContextFault> {
        let token = snapshot.token.ok_or(ContextFault::TokenMissing)?;
        if !token.active {
            return Err(ContextFault::TokenInactive);
        }
        let api_key = cipher
            .decrypt(&token.encrypted_secret)
            .map_err(ContextFault::DecryptFailed)?;

        let mut members: HashMap<i64, MemberState> = snapshot
            .members
            .into_iter()
            .map(|member| {
                (
                    member.agent_id,
                    MemberState {
                        member,
                        summary: None,
                        message_count: 0,
                    },
                )
            })
            .collect();

        for row in snapshot.summaries {
            if let Some(state) = members.get_mut(&row.agent_id) {
                if !row.summary.trim().is_empty() {
                    state.summary = Some(row.summary);
                }
                state.message_count = row.message_count;
            }
        }

        let conversations = snapshot
            .conversations
            .into_iter()
            .map(|c| ((c.sender_id, c.receiver_id), c.id))
            .collect();

        Ok(Self {
            project: snapshot.project,
            api_key,
            members,
            conversations,
        })
    }

    /// Conversation id for an unordered agent pair.
    pub fn conversation_id(&self, a: i64, b: i64) -> Option<i64> {
        self.conversations.get(&conversation_pair(a, b)).copied()
    }

    /// Display name for an agent id.
    pub fn agent_name(&self, agent_id: i64) -> &str {
        if let Some(state) = self.members.get(&agent_id) {
            return &state.member.name;
        }
        if agent_id == SYSTEM_AGENT_ID {
            return "System";
        }
        "Unknown"
    }

    /// Model for an agent, falling back to the project default.
    pub fn model_for<'a>(&'a self, agent_id: i64, default_model: &'a str) -> &'a str {
        match self.members.get(&agent_id) {
            Some(state) if !state.member.model.trim().is_empty() => &state.member.model,
            _ => default_model,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use database::context::ContextToken;
    use database::models::{AgentSummary, Conversation};

    pub fn test_cipher() -> TokenCipher {
        TokenCipher::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    fn member(agent_id: i64, name: &str, role: &str, prompt: &str, can_message: Vec<i64>) -> ProjectMember {
        ProjectMember {
            project_id: 100,
            agent_id,
            name: name.to_string(),
            role: role.to_string(),
            prompt: prompt.to_string(),
            model: "gpt-4o".to_string(),
            can_message,
        }
    }

    pub fn test_snapshot(cipher: &TokenCipher) -> ProjectContext {
        ProjectContext {
            project: Project {
                id: 100,
                user_id: 10,
                title: "demo".to_string(),
                description: String::new(),
                system_prompt: "Collaborate.".to_string(),
                paused: false,
                message_limit: 5,
                token_id: Some(1),
                created_at: String::new(),
                last_activity_at: String::new(),
            },
            token: Some(ContextToken {
                encrypted_secret: cipher.encrypt("sk-x"),
                active: true,
            }),
            members: vec![
                member(1, "Ada", "planner", "Plans.", vec![2]),
                member(2, "Brel", "builder", "Builds.", vec![1]),
            ],
            conversations: vec![Conversation {
                id: 7,
                project_id: 100,
                sender_id: 1,
                receiver_id: 2,
                created_at: String::new(),
            }],
            summaries: vec![AgentSummary {
                project_id: 100,
                agent_id: 1,
                summary: "Ada met Brel.".to_string(),
                history_json: None,
                message_count: 3,
                summary_count: 1,
                updated_at: String::new(),
            }],
            recent_messages: Vec::new(),
        }
    }

    /// A ready-to-use two-agent context.
    pub fn test_context() -> RunContext {
        let cipher = test_cipher();
        RunContext::build(test_snapshot(&cipher), &cipher).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_build_indexes_snapshot() {
        let ctx = test_context();

        assert_eq!(ctx.api_key, "sk-x");
        assert_eq!(ctx.members.len(), 2);

        let ada = &ctx.members[&1];
        assert_eq!(ada.summary.as_deref(), Some("Ada met Brel."));
        assert_eq!(ada.message_count, 3);
        assert_eq!(
            ada.allowed_recipients().into_iter().collect::<Vec<_>>(),
            vec![2]
        );

        assert_eq!(ctx.conversation_id(2, 1), Some(7));
        assert_eq!(ctx.conversation_id(1, 2), Some(7));
        assert_eq!(ctx.conversation_id(0, 1), None);

        assert_eq!(ctx.agent_name(0), "System");
        assert_eq!(ctx.agent_name(1), "Ada");
        assert_eq!(ctx.agent_name(99), "Unknown");

        assert_eq!(ctx.model_for(1, "fallback"), "gpt-4o");
        assert_eq!(ctx.model_for(99, "fallback"), "fallback");
    }

    #[test]
    fn test_token_faults() {
        let cipher = test_cipher();

        let mut snapshot = test_snapshot(&cipher);
        snapshot.token = None;
        assert!(matches!(
            RunContext::build(snapshot, &cipher),
            Err(ContextFault::TokenMissing)
        ));

        let mut snapshot = test_snapshot(&cipher);
        if let Some(token) = snapshot.token.as_mut() {
            token.active = false;
        }
        assert!(matches!(
            RunContext::build(snapshot, &cipher),
            Err(ContextFault::TokenInactive)
        ));

        let mut snapshot = test_snapshot(&cipher);
        if let Some(token) = snapshot.token.as_mut() {
            token.encrypted_secret = "aa:bb".to_string();
        }
        assert!(matches!(
            RunContext::build(snapshot, &cipher),
            Err(ContextFault::DecryptFailed(_))
        ));
    }
}
