//! Turn and Conversation domain types.
//!
//! A conversation is an append-only log of turns. Each turn is tagged with
//! the logical speaker that produced it; the two-role view sent to the LLM
//! (`user` / `assistant`) is derived from that tag, never from position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a chat session. Each session owns one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a message on the chat-completion wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed protocol instructions
    System,
    /// The end user, or a prompt the agent synthesized on the user's behalf
    User,
    /// Anything said from the assistant side
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A role-tagged message as transmitted to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The logical speaker behind a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// Typed by the user, or synthesized as the next prompt of the chain
    User,
    /// An LLM reply
    Assistant,
    /// Query results, clarifying questions and other agent bookkeeping
    Tool,
}

impl Speaker {
    /// The wire role for this speaker. Tool output travels on the assistant side.
    pub fn role(&self) -> Role {
        match self {
            Speaker::User => Role::User,
            Speaker::Assistant | Speaker::Tool => Role::Assistant,
        }
    }
}

/// One appended entry in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was appended (or the log was cleared)
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn whose speaker follows position parity: even index is
    /// the user, odd index the assistant.
    pub fn append(&mut self, text: impl Into<String>) {
        let speaker = if self.turns.len() % 2 == 0 {
            Speaker::User
        } else {
            Speaker::Assistant
        };
        self.push(speaker, text);
    }

    /// Append a turn with an explicit speaker.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.updated_at = Utc::now();
        self.turns.push(Turn::new(speaker, text));
    }

    /// Materialize the role-tagged view sent to the LLM.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage {
                role: t.speaker.role(),
                content: t.content.clone(),
            })
            .collect()
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.updated_at = Utc::now();
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_alternates_roles_by_position() {
        let mut conv = Conversation::new();
        for i in 0..7 {
            conv.append(format!("turn {i}"));
        }

        let snapshot = conv.snapshot();
        assert_eq!(snapshot.len(), 7);
        for (i, msg) in snapshot.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(msg.role, expected, "index {i}");
        }
    }

    #[test]
    fn parity_ignores_content() {
        let mut conv = Conversation::new();
        conv.append("");
        conv.append("query database: SELECT 1;");
        conv.append("assistant-looking text");

        let roles: Vec<Role> = conv.snapshot().into_iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn clear_resets_alternation() {
        let mut conv = Conversation::new();
        conv.append("first");
        conv.append("second");
        conv.append("third");
        conv.clear();
        assert!(conv.is_empty());

        conv.append("after clear");
        assert_eq!(conv.snapshot()[0].role, Role::User);
        assert_eq!(conv.turns()[0].speaker, Speaker::User);
    }

    #[test]
    fn tagged_turns_map_role_from_speaker() {
        let mut conv = Conversation::new();
        conv.push(Speaker::User, "how high did we fly?");
        conv.push(Speaker::Tool, "Database results: [(120.5,)]");
        conv.push(Speaker::Tool, "The query returned no results.");
        conv.push(Speaker::User, "Re-evaluate the query.");

        let roles: Vec<Role> = conv.snapshot().into_iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Assistant, Role::User]
        );
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Speaker::User, "First message");
        assert_eq!(conv.len(), 1);
        assert!(conv.updated_at >= created);
        assert_eq!(conv.last().map(|t| t.content.as_str()), Some("First message"));
    }

    #[test]
    fn chat_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert!(json.contains("\"assistant\""));
    }
}
