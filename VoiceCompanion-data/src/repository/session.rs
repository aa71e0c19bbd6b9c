use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::database::DatabasePool;
use crate::models::session::{AiSession, ConversationMessage, NewConversationMessage, SessionUpdate};
use super::errors::RepositoryError;

const SESSION_COLUMNS: &str = "id, session_id, user_id, created_at, updated_at, is_active, language, \
                               voice_style, context_summary, conversation_count, total_duration, metadata";

const MESSAGE_COLUMNS: &str = "id, session_id, message_type, content, timestamp, intent_id, confidence, \
                               emotion, language, processing_time, metadata";

/// Repository trait for AI sessions and their messages
#[async_trait]
pub trait SessionRepositoryTrait {
    async fn create(
        &self,
        session_id: &str,
        user_id: i64,
        voice_style: &str,
        language: &str,
    ) -> Result<AiSession, RepositoryError>;

    /// Look a session up regardless of its active flag
    async fn get(&self, session_id: &str) -> Result<Option<AiSession>, RepositoryError>;

    /// Active sessions of a user, most recently updated first
    async fn list_active_for_user(&self, user_id: i64) -> Result<Vec<AiSession>, RepositoryError>;

    /// Apply the set fields of `update` and bump `updated_at`
    async fn update(&self, session_id: &str, update: SessionUpdate) -> Result<(), RepositoryError>;

    /// Append a message, increment `conversation_count` and bump `updated_at`
    async fn add_message(
        &self,
        session_id: &str,
        message: NewConversationMessage,
    ) -> Result<ConversationMessage, RepositoryError>;

    /// The latest `limit` messages in chronological order
    async fn recent_messages(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationMessage>, RepositoryError>;

    /// Every message of a session in chronological order
    async fn all_messages(&self, session_id: &str) -> Result<Vec<ConversationMessage>, RepositoryError>;

    /// Mark a session inactive; false when it was not active
    async fn close(&self, session_id: &str) -> Result<bool, RepositoryError>;

    /// Close active sessions not updated since `cutoff`, returning how many were closed
    async fn close_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

/// SQLite-backed session repository
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: DatabasePool,
}

impl SessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<AiSession> {
    Ok(AiSession {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        is_active: row.get(5)?,
        language: row.get(6)?,
        voice_style: row.get(7)?,
        context_summary: row.get(8)?,
        conversation_count: row.get(9)?,
        total_duration: row.get(10)?,
        metadata: row.get(11)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<ConversationMessage> {
    let raw_type: String = row.get(2)?;
    let message_type = raw_type.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(ConversationMessage {
        id: row.get(0)?,
        session_id: row.get(1)?,
        message_type,
        content: row.get(3)?,
        timestamp: row.get(4)?,
        intent_id: row.get(5)?,
        confidence: row.get(6)?,
        emotion: row.get(7)?,
        language: row.get(8)?,
        processing_time: row.get(9)?,
        metadata: row.get(10)?,
    })
}

#[async_trait]
impl SessionRepositoryTrait for SessionRepository {
    async fn create(
        &self,
        session_id: &str,
        user_id: i64,
        voice_style: &str,
        language: &str,
    ) -> Result<AiSession, RepositoryError> {
        debug!("Creating session {} for user {}", session_id, user_id);
        let conn = self.pool.connection()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO ai_sessions (session_id, user_id, created_at, updated_at, is_active, language, voice_style)
             VALUES (?1, ?2, ?3, ?3, 1, ?4, ?5)",
            params![session_id, user_id, now, language, voice_style],
        )
        .map_err(|e| RepositoryError::from_insert(e, "session"))?;

        let sql = format!("SELECT {} FROM ai_sessions WHERE session_id = ?1", SESSION_COLUMNS);
        Ok(conn.query_row(&sql, params![session_id], map_session)?)
    }

    async fn get(&self, session_id: &str) -> Result<Option<AiSession>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!("SELECT {} FROM ai_sessions WHERE session_id = ?1", SESSION_COLUMNS);
        Ok(conn.query_row(&sql, params![session_id], map_session).optional()?)
    }

    async fn list_active_for_user(&self, user_id: i64) -> Result<Vec<AiSession>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!(
            "SELECT {} FROM ai_sessions WHERE user_id = ?1 AND is_active = 1 ORDER BY updated_at DESC, id DESC",
            SESSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], map_session)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(&self, session_id: &str, update: SessionUpdate) -> Result<(), RepositoryError> {
        let conn = self.pool.connection()?;
        let changed = conn.execute(
            "UPDATE ai_sessions SET
                language = COALESCE(?1, language),
                voice_style = COALESCE(?2, voice_style),
                context_summary = COALESCE(?3, context_summary),
                metadata = COALESCE(?4, metadata),
                total_duration = COALESCE(?5, total_duration),
                updated_at = ?6
             WHERE session_id = ?7",
            params![
                update.language,
                update.voice_style,
                update.context_summary,
                update.metadata,
                update.total_duration,
                Utc::now(),
                session_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }

    async fn add_message(
        &self,
        session_id: &str,
        message: NewConversationMessage,
    ) -> Result<ConversationMessage, RepositoryError> {
        let mut conn = self.pool.connection()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let changed = tx.execute(
            "UPDATE ai_sessions SET conversation_count = conversation_count + 1, updated_at = ?1
             WHERE session_id = ?2",
            params![now, session_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("session {}", session_id)));
        }

        tx.execute(
            "INSERT INTO conversation_messages
                (session_id, message_type, content, timestamp, intent_id, confidence, emotion, language,
                 processing_time, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session_id,
                message.message_type.as_str(),
                message.content,
                now,
                message.intent_id,
                message.confidence,
                message.emotion,
                message.language,
                message.processing_time,
                message.metadata,
            ],
        )?;
        let id = tx.last_insert_rowid();

        let sql = format!("SELECT {} FROM conversation_messages WHERE id = ?1", MESSAGE_COLUMNS);
        let stored = tx.query_row(&sql, params![id], map_message)?;
        tx.commit()?;
        Ok(stored)
    }

    async fn recent_messages(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!(
            "SELECT {} FROM conversation_messages WHERE session_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![session_id, limit as i64], map_message)?;
        let mut messages = rows.collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn all_messages(&self, session_id: &str) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!(
            "SELECT {} FROM conversation_messages WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![session_id], map_message)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn close(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.connection()?;
        let changed = conn.execute(
            "UPDATE ai_sessions SET is_active = 0, updated_at = ?1 WHERE session_id = ?2 AND is_active = 1",
            params![Utc::now(), session_id],
        )?;
        Ok(changed > 0)
    }

    async fn close_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let conn = self.pool.connection()?;
        let changed = conn.execute(
            "UPDATE ai_sessions SET is_active = 0 WHERE is_active = 1 AND updated_at < ?1",
            params![cutoff],
        )?;
        debug!("Closed {} expired sessions", changed);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use crate::models::session::MessageType;

    async fn setup() -> (DatabasePool, SessionRepository) {
        let pool = create_in_memory_pool().unwrap();
        {
            let conn = pool.connection().unwrap();
            conn.execute(
                "INSERT INTO users (id, username, password_hash, created_at) VALUES (1, 'u', 'h', ?1)",
                params![Utc::now()],
            )
            .unwrap();
        }
        let repo = SessionRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup().await;
        let session = repo.create("s-1", 1, "yunxi", "zh").await.unwrap();

        assert!(session.is_active);
        assert_eq!(session.voice_style, "yunxi");
        assert_eq!(session.conversation_count, 0);
        assert_eq!(repo.get("s-1").await.unwrap().unwrap().id, session.id);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_are_counted_and_ordered() {
        let (_pool, repo) = setup().await;
        repo.create("s-1", 1, "default", "zh").await.unwrap();

        for i in 0..5 {
            let kind = if i % 2 == 0 { MessageType::User } else { MessageType::Ai };
            repo.add_message("s-1", NewConversationMessage::new(kind, format!("m{}", i)))
                .await
                .unwrap();
        }

        let recent = repo.recent_messages("s-1", 3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);

        assert_eq!(repo.all_messages("s-1").await.unwrap().len(), 5);
        assert_eq!(repo.get("s-1").await.unwrap().unwrap().conversation_count, 5);
    }

    #[tokio::test]
    async fn test_add_message_to_unknown_session() {
        let (_pool, repo) = setup().await;
        let err = repo
            .add_message("nope", NewConversationMessage::new(MessageType::User, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_close_and_expire() {
        let (_pool, repo) = setup().await;
        repo.create("a", 1, "default", "zh").await.unwrap();
        repo.create("b", 1, "default", "zh").await.unwrap();

        assert!(repo.close("a").await.unwrap());
        assert!(!repo.close("a").await.unwrap());

        let active = repo.list_active_for_user(1).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, "b");

        let closed = repo
            .close_inactive_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(closed, 1);
        assert!(repo.list_active_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_fields() {
        let (_pool, repo) = setup().await;
        repo.create("s", 1, "default", "zh").await.unwrap();
        repo.update(
            "s",
            SessionUpdate {
                language: Some("en".to_string()),
                context_summary: Some("用户: hi".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let session = repo.get("s").await.unwrap().unwrap();
        assert_eq!(session.language, "en");
        assert_eq!(session.voice_style, "default");
        assert_eq!(session.context_summary.as_deref(), Some("用户: hi"));
    }
}
