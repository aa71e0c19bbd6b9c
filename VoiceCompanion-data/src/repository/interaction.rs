use async_trait::async_trait;
use chrono::{Duration, Utc};
use rusqlite::{params, Row};

use crate::database::DatabasePool;
use crate::models::interaction::{InteractionLog, InteractionStatistics, NewInteractionLog};
use super::errors::RepositoryError;

const LOG_COLUMNS: &str = "log_id, session_id, user_id, timestamp, user_input, ai_reply, emotion, intent_id, \
                           confidence, explanation, processing_time, model_used, language";

/// Repository trait for the AI interaction log
#[async_trait]
pub trait InteractionRepositoryTrait {
    async fn insert(&self, log: NewInteractionLog) -> Result<i64, RepositoryError>;

    /// Newest first, optionally filtered by user and session
    async fn history(
        &self,
        user_id: Option<i64>,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InteractionLog>, RepositoryError>;

    /// Aggregates over the last `days` days
    async fn statistics(&self, days: i64) -> Result<InteractionStatistics, RepositoryError>;

    /// Delete entries older than `days_to_keep` days, returning how many were removed
    async fn delete_older_than(&self, days_to_keep: i64) -> Result<usize, RepositoryError>;
}

/// SQLite-backed interaction log
#[derive(Debug, Clone)]
pub struct InteractionRepository {
    pool: DatabasePool,
}

impl InteractionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_log(row: &Row<'_>) -> rusqlite::Result<InteractionLog> {
    Ok(InteractionLog {
        log_id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        timestamp: row.get(3)?,
        user_input: row.get(4)?,
        ai_reply: row.get(5)?,
        emotion: row.get(6)?,
        intent_id: row.get(7)?,
        confidence: row.get(8)?,
        explanation: row.get(9)?,
        processing_time: row.get(10)?,
        model_used: row.get(11)?,
        language: row.get(12)?,
    })
}

#[async_trait]
impl InteractionRepositoryTrait for InteractionRepository {
    async fn insert(&self, log: NewInteractionLog) -> Result<i64, RepositoryError> {
        let conn = self.pool.connection()?;
        conn.execute(
            "INSERT INTO ai_interactions
                (session_id, user_id, timestamp, user_input, ai_reply, emotion, intent_id, confidence,
                 explanation, processing_time, model_used, language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                log.session_id,
                log.user_id,
                Utc::now(),
                log.user_input,
                log.ai_reply,
                log.emotion,
                log.intent_id,
                log.confidence,
                log.explanation,
                log.processing_time,
                log.model_used,
                log.language,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn history(
        &self,
        user_id: Option<i64>,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InteractionLog>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!(
            "SELECT {} FROM ai_interactions
             WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR session_id = ?2)
             ORDER BY timestamp DESC, log_id DESC LIMIT ?3",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, session_id, limit as i64], map_log)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn statistics(&self, days: i64) -> Result<InteractionStatistics, RepositoryError> {
        let conn = self.pool.connection()?;
        let since = Utc::now() - Duration::days(days);
        let sql = format!("SELECT {} FROM ai_interactions WHERE timestamp >= ?1", LOG_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![since], map_log)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InteractionStatistics::from_logs(&logs, days))
    }

    async fn delete_older_than(&self, days_to_keep: i64) -> Result<usize, RepositoryError> {
        let conn = self.pool.connection()?;
        let cutoff = Utc::now() - Duration::days(days_to_keep);
        Ok(conn.execute("DELETE FROM ai_interactions WHERE timestamp < ?1", params![cutoff])?)
    }
}
