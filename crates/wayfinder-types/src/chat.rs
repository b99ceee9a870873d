//! Conversation and RAG chat types.
//!
//! Conversation messages belong to a session identified by an opaque string
//! (callers may supply their own ids; new sessions get a UUIDv7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::entity::EntityType;
use crate::error::ValidationError;
use crate::llm::MessageRole;

/// Maximum length of a chat message, in characters.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 2000;

/// Role of a stored conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

impl fmt::Display for ConversationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationRole::User => write!(f, "user"),
            ConversationRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ConversationRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ConversationRole::User),
            "assistant" => Ok(ConversationRole::Assistant),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

impl From<ConversationRole> for MessageRole {
    fn from(role: ConversationRole) -> Self {
        match role {
            ConversationRole::User => MessageRole::User,
            ConversationRole::Assistant => MessageRole::Assistant,
        }
    }
}

/// A single message in a conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub user_id: Option<i64>,
    pub role: ConversationRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Request for a RAG-enhanced chat answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_include_sources")]
    pub include_sources: bool,
    #[serde(default = "default_max_context_items")]
    pub max_context_items: usize,
}

fn default_include_sources() -> bool {
    true
}

fn default_max_context_items() -> usize {
    5
}

impl RagChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: None,
            session_id: None,
            include_sources: default_include_sources(),
            max_context_items: default_max_context_items(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.trim().is_empty() {
            return Err(ValidationError::Empty("message"));
        }
        let chars = self.message.chars().count();
        if chars > MAX_CHAT_MESSAGE_CHARS {
            return Err(ValidationError::out_of_range(
                "message",
                format!("must be at most {MAX_CHAT_MESSAGE_CHARS} characters, got {chars}"),
            ));
        }
        if !(1..=10).contains(&self.max_context_items) {
            return Err(ValidationError::out_of_range(
                "max_context_items",
                format!("must be between 1 and 10, got {}", self.max_context_items),
            ));
        }
        Ok(())
    }
}

/// A retrieved entity cited by a chat answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSource {
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub title: String,
    pub relevance_score: f32,
    pub snippet: Option<String>,
}

/// A follow-up action offered alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub action_type: String,
    pub label: String,
    pub payload: serde_json::Value,
}

/// Outcome of a RAG chat request.
///
/// Failures are reported through `success` and `error`; the orchestrator
/// never returns an `Err` for a validated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagChatResponse {
    pub success: bool,
    pub message: String,
    pub sources: Vec<ChatSource>,
    pub suggested_actions: Vec<SuggestedAction>,
    pub session_id: String,
    pub tokens_used: u32,
    pub response_time_ms: f64,
    /// True when the answer was generated without retrieved context because
    /// the query could not be embedded.
    #[serde(default)]
    pub degraded_context: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
