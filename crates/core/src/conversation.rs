//! Conversation types: speaker roles and emitted transcript messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a speaker in a voice call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Caller/customer side
    User,
    /// Voice assistant side
    Agent,
}

impl Role {
    /// All roles, in the order the engine walks them
    pub const ALL: [Role; 2] = [Role::User, Role::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }

    /// Parse an upstream role spelling.
    ///
    /// Providers disagree on naming the assistant side, so `agent`,
    /// `assistant` and `bot` all map to [`Role::Agent`].
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "customer" => Some(Role::User),
            "agent" | "assistant" | "bot" => Some(Role::Agent),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed turn in a call transcript
///
/// Immutable once emitted. `sequence` starts at 1 for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Speaker of the turn
    pub role: Role,
    /// Trimmed utterance text
    pub content: String,
    /// Position in the call transcript
    pub sequence: u64,
    /// When the turn was completed
    pub timestamp: DateTime<Utc>,
}

impl TranscriptMessage {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>, sequence: u64) -> Self {
        Self {
            role,
            content: content.into(),
            sequence,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_aliases() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("Assistant"), Some(Role::Agent));
        assert_eq!(Role::parse(" bot "), Some(Role::Agent));
        assert_eq!(Role::parse("agent"), Some(Role::Agent));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn test_transcript_message_serialization() {
        let msg = TranscriptMessage::new(Role::Agent, "How can I help?", 2);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "agent");
        assert_eq!(json["content"], "How can I help?");
        assert_eq!(json["sequence"], 2);
        assert!(json["timestamp"].is_string());
    }
}
