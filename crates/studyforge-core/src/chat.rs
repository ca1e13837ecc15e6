//! Chat assistant history records. Storage only; no business logic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{RecordId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            "system" => Ok(ChatRole::System),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// A conversation with the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: RecordId,
    pub title: String,
    /// Page the conversation was opened from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_context: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ChatSession {
    pub fn new(title: impl Into<String>, page_context: Option<String>, at: Timestamp) -> Self {
        Self {
            id: RecordId::generate(),
            title: title.into(),
            page_context,
            created_at: at,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: RecordId,
    pub session_id: RecordId,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(session_id: RecordId, role: ChatRole, content: impl Into<String>, at: Timestamp) -> Self {
        Self {
            id: RecordId::generate(),
            session_id,
            role,
            content: content.into(),
            timestamp: at,
        }
    }
}
