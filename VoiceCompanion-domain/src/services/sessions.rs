use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use voice_companion_data::models::{AiSession, ConversationMessage, MessageType, NewConversationMessage, SessionUpdate};
use voice_companion_data::repository::{RepositoryError, SessionRepositoryTrait};

use crate::services::language::DEFAULT_LANGUAGE;
use crate::services::voice_styles::DEFAULT_VOICE_STYLE;

pub type SessionStore = Arc<dyn SessionRepositoryTrait + Send + Sync>;

/// Sessions idle for longer than this are closed by the cleanup pass
pub const SESSION_MAX_AGE_HOURS: i64 = 24;

/// Session service errors
#[derive(Debug, Error)]
pub enum SessionServiceError {
    /// Unknown, closed, or owned by someone else
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),
}

fn map_repo_error(err: RepositoryError) -> SessionServiceError {
    match err {
        RepositoryError::NotFound(msg) => SessionServiceError::NotFound(msg),
        other => SessionServiceError::RepositoryError(other.to_string()),
    }
}

/// Public view of a session
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub language: String,
    pub voice_style: String,
    pub conversation_count: i64,
    pub context_summary: Option<String>,
}

impl From<AiSession> for SessionInfo {
    fn from(session: AiSession) -> Self {
        Self {
            session_id: session.session_id,
            user_id: session.user_id,
            created_at: session.created_at,
            updated_at: session.updated_at,
            is_active: session.is_active,
            language: session.language,
            voice_style: session.voice_style,
            conversation_count: session.conversation_count,
            context_summary: session.context_summary,
        }
    }
}

/// One entry of a session's history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryMessage {
    pub id: i64,
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub intent_id: Option<i64>,
    pub confidence: Option<f64>,
    pub emotion: Option<String>,
    pub language: Option<String>,
}

impl From<ConversationMessage> for HistoryMessage {
    fn from(message: ConversationMessage) -> Self {
        Self {
            id: message.id,
            message_type: message.message_type.to_string(),
            content: message.content,
            timestamp: message.timestamp,
            intent_id: message.intent_id,
            confidence: message.confidence,
            emotion: message.emotion,
            language: message.language,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct LanguageDistribution {
    /// Most used language among user messages; ties go to the one seen first
    pub primary_language: Option<String>,
    pub language_counts: BTreeMap<String, usize>,
    pub total_messages: usize,
}

impl LanguageDistribution {
    fn from_messages(messages: &[ConversationMessage]) -> Self {
        let user_messages: Vec<&ConversationMessage> = messages
            .iter()
            .filter(|m| m.message_type == MessageType::User)
            .collect();

        let mut ordered: Vec<(String, usize)> = Vec::new();
        for language in user_messages.iter().filter_map(|m| m.language.as_deref()) {
            match ordered.iter_mut().find(|(lang, _)| lang == language) {
                Some((_, count)) => *count += 1,
                None => ordered.push((language.to_string(), 1)),
            }
        }

        let mut primary: Option<&(String, usize)> = None;
        for entry in &ordered {
            if primary.map_or(true, |best| entry.1 > best.1) {
                primary = Some(entry);
            }
        }

        Self {
            primary_language: primary.map(|(lang, _)| lang.clone()),
            language_counts: ordered.iter().cloned().collect(),
            total_messages: user_messages.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionStatistics {
    pub session_id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_messages: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
    pub conversation_count: i64,
    pub total_duration: f64,
    pub language: String,
    pub voice_style: String,
    pub avg_processing_time: f64,
    pub avg_confidence: f64,
    pub is_active: bool,
    pub language_distribution: LanguageDistribution,
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Conversation sessions with a write-through cache of active sessions
pub struct SessionManager {
    store: SessionStore,
    active: Mutex<HashMap<String, AiSession>>,
}

impl SessionManager {
    pub fn new(store: SessionStore) -> Self {
        Self { store, active: Mutex::new(HashMap::new()) }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, AiSession>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn refresh_cache(&self, session_id: &str) {
        match self.store.get(session_id).await {
            Ok(Some(session)) if session.is_active => {
                self.cache().insert(session_id.to_string(), session);
            }
            Ok(_) => {
                self.cache().remove(session_id);
            }
            Err(e) => error!("Failed to refresh cached session {}: {}", session_id, e),
        }
    }

    /// Open a session; its language is settled later from what the user speaks
    pub async fn create_session(&self, user_id: i64, voice_style: Option<&str>) -> Result<String, SessionServiceError> {
        let session_id = Uuid::new_v4().to_string();
        let session = self
            .store
            .create(&session_id, user_id, voice_style.unwrap_or(DEFAULT_VOICE_STYLE), DEFAULT_LANGUAGE)
            .await
            .map_err(map_repo_error)?;

        self.cache().insert(session_id.clone(), session);
        info!(%session_id, user_id, "Created conversation session");
        Ok(session_id)
    }

    /// An active session, served from the cache when possible
    pub async fn get_session(&self, session_id: &str) -> Result<Option<AiSession>, SessionServiceError> {
        if let Some(session) = self.cache().get(session_id).filter(|s| s.is_active).cloned() {
            return Ok(Some(session));
        }

        match self.store.get(session_id).await.map_err(map_repo_error)? {
            Some(session) if session.is_active => {
                self.cache().insert(session_id.to_string(), session.clone());
                Ok(Some(session))
            }
            _ => Ok(None),
        }
    }

    /// Active session owned by `user_id`, `NotFound` otherwise
    pub async fn get_owned_session(&self, session_id: &str, user_id: i64) -> Result<AiSession, SessionServiceError> {
        match self.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(SessionServiceError::NotFound(session_id.to_string())),
        }
    }

    /// Reuse `session_id` when it is active and owned by the user, else open a new session
    pub async fn get_or_create_session(
        &self,
        user_id: i64,
        session_id: Option<&str>,
        voice_style: Option<&str>,
    ) -> Result<String, SessionServiceError> {
        if let Some(id) = session_id {
            if let Some(session) = self.get_session(id).await? {
                if session.user_id == user_id {
                    if let Some(style) = voice_style {
                        self.update_session_info(id, SessionUpdate {
                            voice_style: Some(style.to_string()),
                            ..Default::default()
                        })
                        .await?;
                    }
                    return Ok(id.to_string());
                }
            }
        }
        self.create_session(user_id, voice_style).await
    }

    pub async fn update_session_info(&self, session_id: &str, update: SessionUpdate) -> Result<(), SessionServiceError> {
        self.store.update(session_id, update).await.map_err(map_repo_error)?;
        self.refresh_cache(session_id).await;
        Ok(())
    }

    pub async fn add_message(
        &self,
        session_id: &str,
        message: NewConversationMessage,
    ) -> Result<ConversationMessage, SessionServiceError> {
        let stored = self.store.add_message(session_id, message).await.map_err(map_repo_error)?;
        self.refresh_cache(session_id).await;
        debug!(%session_id, message_type = %stored.message_type, "Stored conversation message");
        Ok(stored)
    }

    /// The latest `limit` messages, oldest first
    pub async fn get_conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, SessionServiceError> {
        self.store.recent_messages(session_id, limit).await.map_err(map_repo_error)
    }

    /// `用户: ...` / `AI: ...` lines for the latest `max_messages` messages
    pub async fn get_context_summary(&self, session_id: &str, max_messages: usize) -> Result<String, SessionServiceError> {
        let messages = self.get_conversation_history(session_id, max_messages).await?;
        Ok(messages
            .iter()
            .map(|m| {
                let role = match m.message_type {
                    MessageType::User => "用户",
                    MessageType::Ai => "AI",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub async fn update_context_summary(&self, session_id: &str) -> Result<(), SessionServiceError> {
        let summary = self.get_context_summary(session_id, 20).await?;
        self.update_session_info(session_id, SessionUpdate {
            context_summary: Some(summary),
            ..Default::default()
        })
        .await
    }

    /// Deactivate a session; false when it was not active
    pub async fn close_session(&self, session_id: &str) -> Result<bool, SessionServiceError> {
        let closed = self.store.close(session_id).await.map_err(map_repo_error)?;
        self.cache().remove(session_id);
        if closed {
            info!(%session_id, "Closed conversation session");
        }
        Ok(closed)
    }

    /// Close sessions idle for more than `max_age_hours`
    pub async fn cleanup_expired_sessions(&self, max_age_hours: i64) -> Result<usize, SessionServiceError> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let closed = self.store.close_inactive_before(cutoff).await.map_err(map_repo_error)?;
        self.cache().retain(|_, session| session.updated_at >= cutoff);
        if closed > 0 {
            info!(closed, "Closed expired conversation sessions");
        }
        Ok(closed)
    }

    /// Most recently updated first
    pub async fn get_user_active_sessions(&self, user_id: i64) -> Result<Vec<AiSession>, SessionServiceError> {
        self.store.list_active_for_user(user_id).await.map_err(map_repo_error)
    }

    pub async fn language_distribution(&self, session_id: &str) -> Result<LanguageDistribution, SessionServiceError> {
        let messages = self.store.all_messages(session_id).await.map_err(map_repo_error)?;
        Ok(LanguageDistribution::from_messages(&messages))
    }

    pub async fn get_session_statistics(&self, session: &AiSession) -> Result<SessionStatistics, SessionServiceError> {
        let messages = self.store.all_messages(&session.session_id).await.map_err(map_repo_error)?;
        let ai_messages: Vec<&ConversationMessage> =
            messages.iter().filter(|m| m.message_type == MessageType::Ai).collect();
        let user_messages = messages.len() - ai_messages.len();

        Ok(SessionStatistics {
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            created_at: session.created_at,
            updated_at: session.updated_at,
            total_messages: messages.len(),
            user_messages,
            ai_messages: ai_messages.len(),
            conversation_count: session.conversation_count,
            total_duration: session.total_duration,
            language: session.language.clone(),
            voice_style: session.voice_style.clone(),
            avg_processing_time: average(ai_messages.iter().filter_map(|m| m.processing_time).filter(|t| *t > 0.0)),
            avg_confidence: average(ai_messages.iter().filter_map(|m| m.confidence).filter(|c| *c > 0.0)),
            is_active: session.is_active,
            language_distribution: LanguageDistribution::from_messages(&messages),
        })
    }

    /// Adopt `detected` as the session language when it already dominates the
    /// user's messages or nothing has been said yet
    pub async fn update_session_language(&self, session_id: &str, detected: &str) -> Result<bool, SessionServiceError> {
        let distribution = self.language_distribution(session_id).await?;
        if distribution.total_messages == 0 || distribution.primary_language.as_deref() == Some(detected) {
            self.update_session_info(session_id, SessionUpdate {
                language: Some(detected.to_string()),
                ..Default::default()
            })
            .await?;
            return Ok(true);
        }
        Ok(false)
    }
}
