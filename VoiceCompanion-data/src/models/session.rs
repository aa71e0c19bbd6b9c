use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for an AI conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSession {
    pub id: i64,
    /// Public identifier (UUID v4)
    pub session_id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub language: String,
    pub voice_style: String,
    pub context_summary: Option<String>,
    pub conversation_count: i64,
    pub total_duration: f64,
    pub metadata: Option<String>,
}

/// Who produced a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Ai,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Ai => "ai",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageType::User),
            "ai" => Ok(MessageType::Ai),
            other => Err(format!("invalid message type: {}", other)),
        }
    }
}

/// Storage model for one message within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub session_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub intent_id: Option<i64>,
    pub confidence: Option<f64>,
    pub emotion: Option<String>,
    pub language: Option<String>,
    /// Seconds spent producing an AI message
    pub processing_time: Option<f64>,
    pub metadata: Option<String>,
}

/// Input for appending a message to a session
#[derive(Debug, Clone)]
pub struct NewConversationMessage {
    pub message_type: MessageType,
    pub content: String,
    pub intent_id: Option<i64>,
    pub confidence: Option<f64>,
    pub emotion: Option<String>,
    pub language: Option<String>,
    pub processing_time: Option<f64>,
    pub metadata: Option<String>,
}

impl NewConversationMessage {
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            intent_id: None,
            confidence: None,
            emotion: None,
            language: None,
            processing_time: None,
            metadata: None,
        }
    }
}

/// Session fields that may change after creation
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub language: Option<String>,
    pub voice_style: Option<String>,
    pub context_summary: Option<String>,
    pub metadata: Option<String>,
    pub total_duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_parse() {
        assert_eq!("user".parse::<MessageType>().unwrap(), MessageType::User);
        assert_eq!("ai".parse::<MessageType>().unwrap(), MessageType::Ai);
        assert!("bot".parse::<MessageType>().is_err());
        assert_eq!(MessageType::Ai.to_string(), "ai");
    }
}
