use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use voice_companion_data::models::{InteractionLog, InteractionStatistics, NewInteractionLog};
use voice_companion_data::repository::{InteractionRepositoryTrait, RepositoryError};

pub type InteractionStore = Arc<dyn InteractionRepositoryTrait + Send + Sync>;

/// Days of interactions kept by [`InteractionService::cleanup`] when nothing else is asked for
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

#[derive(Debug, Error)]
pub enum InteractionServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),
}

fn map_repo_error(err: RepositoryError) -> InteractionServiceError {
    match err {
        RepositoryError::Validation(msg) => InteractionServiceError::ValidationError(msg),
        other => InteractionServiceError::RepositoryError(other.to_string()),
    }
}

/// Persistent log of every AI exchange
#[derive(Clone)]
pub struct InteractionService {
    store: InteractionStore,
}

impl InteractionService {
    pub fn new(store: InteractionStore) -> Self {
        Self { store }
    }

    /// Store one exchange; a failed write is traced and reported as `None`
    pub async fn log_interaction(&self, entry: NewInteractionLog) -> Option<i64> {
        info!(
            user_id = ?entry.user_id,
            session_id = ?entry.session_id,
            intent_id = ?entry.intent_id,
            emotion = ?entry.emotion,
            confidence = ?entry.confidence,
            language = ?entry.language,
            model = ?entry.model_used,
            processing_time = ?entry.processing_time,
            "AI interaction"
        );
        match self.store.insert(entry).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to store interaction log: {}", e);
                None
            }
        }
    }

    pub async fn history(
        &self,
        user_id: Option<i64>,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InteractionLog>, InteractionServiceError> {
        self.store.history(user_id, session_id, limit).await.map_err(map_repo_error)
    }

    pub async fn statistics(&self, days: i64) -> Result<InteractionStatistics, InteractionServiceError> {
        if days <= 0 {
            return Err(InteractionServiceError::ValidationError(
                "days: Must be a positive number of days".to_string(),
            ));
        }
        self.store.statistics(days).await.map_err(map_repo_error)
    }

    pub async fn cleanup(&self, days_to_keep: i64) -> Result<usize, InteractionServiceError> {
        let removed = self.store.delete_older_than(days_to_keep).await.map_err(map_repo_error)?;
        if removed > 0 {
            info!(removed, days_to_keep, "Removed old interaction logs");
        }
        Ok(removed)
    }
}
