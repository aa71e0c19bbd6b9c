use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use voice_companion_data::models::AiSession;
use voice_companion_domain::services::sessions::HistoryMessage;

/// Typed message for `POST /ai/response`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AiRequest {
    #[validate(length(min = 1, max = 2000, message = "Input must be 1 to 2000 characters"))]
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdviceResponse {
    pub advice: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub voice_style: Option<String>,
}

/// The language is settled from the first utterances, hence the placeholder
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub user_id: i64,
    pub voice_style: Option<String>,
    pub language: String,
}

/// Language placeholder reported for a session nobody has spoken in yet
pub const LANGUAGE_PENDING: &str = "动态检测中";

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// Number of latest messages (default: 10, max: 100)
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionHistoryResponse {
    pub session_id: String,
    pub messages: Vec<HistoryMessage>,
}

/// Entry of `GET /ai/sessions/active`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub language: String,
    pub voice_style: String,
    pub conversation_count: i64,
    pub context_summary: Option<String>,
}

impl From<AiSession> for ActiveSession {
    fn from(session: AiSession) -> Self {
        Self {
            session_id: session.session_id,
            created_at: session.created_at,
            updated_at: session.updated_at,
            language: session.language,
            voice_style: session.voice_style,
            conversation_count: session.conversation_count,
            context_summary: session.context_summary,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveSessionsResponse {
    pub user_id: i64,
    pub sessions: Vec<ActiveSession>,
}
