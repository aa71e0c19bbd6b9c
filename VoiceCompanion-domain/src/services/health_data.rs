use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use validator::Validate;

use voice_companion_data::models::HealthData;
use voice_companion_data::repository::{HealthDataRepositoryTrait, RepositoryError};

use crate::entities::conversions::{convert_to_health_record, convert_to_new_health_data};
use crate::entities::health_data::{HealthRecord, HealthStats, UploadHealthDataRequest};
use crate::services::flatten_validation_errors;

pub type HealthDataStore = Arc<dyn HealthDataRepositoryTrait + Send + Sync>;

/// Rows considered by [`HealthDataService::stats`]
pub const STATS_WINDOW_DAYS: usize = 7;
pub const DAILY_STEP_GOAL: i64 = 10_000;
pub const WEEKLY_STEP_GOAL: i64 = DAILY_STEP_GOAL * 7;

#[derive(Debug, Error)]
pub enum HealthDataServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),
}

fn map_repo_error(err: RepositoryError) -> HealthDataServiceError {
    match err {
        RepositoryError::Validation(msg) => HealthDataServiceError::ValidationError(msg),
        other => HealthDataServiceError::RepositoryError(other.to_string()),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn activity_level(avg_daily_steps: f64) -> &'static str {
    if avg_daily_steps < 5000.0 {
        "低"
    } else if avg_daily_steps < 10000.0 {
        "中等"
    } else {
        "高"
    }
}

/// 40 points for steps, 30 for sleep inside 7 to 9 hours, 30 for a 60 to 100 bpm heart rate
fn health_score(avg_steps: f64, avg_sleep: f64, avg_heart_rate: f64) -> i64 {
    let steps = (avg_steps / DAILY_STEP_GOAL as f64).min(1.0) * 40.0;
    let sleep_off = if avg_sleep < 7.0 {
        7.0 - avg_sleep
    } else if avg_sleep > 9.0 {
        avg_sleep - 9.0
    } else {
        0.0
    };
    let sleep = (30.0 - sleep_off * 10.0).max(0.0);
    let heart_off = if avg_heart_rate < 60.0 {
        60.0 - avg_heart_rate
    } else if avg_heart_rate > 100.0 {
        avg_heart_rate - 100.0
    } else {
        0.0
    };
    let heart = (30.0 - heart_off).max(0.0);
    (steps + sleep + heart).round() as i64
}

/// Aggregate the given rows; an empty slice gives zeros and `无数据`
pub fn compute_stats(rows: &[HealthData]) -> HealthStats {
    if rows.is_empty() {
        return HealthStats {
            total_steps: 0,
            avg_heart_rate: 0.0,
            avg_sleep_hours: 0.0,
            activity_level: "无数据".to_string(),
            health_score: 0,
            weekly_goal_progress: 0,
        };
    }

    let count = rows.len() as f64;
    let total_steps: i64 = rows.iter().map(|r| r.steps).sum();
    let avg_steps = total_steps as f64 / count;
    let avg_heart_rate = rows.iter().map(|r| r.heart_rate as f64).sum::<f64>() / count;
    let avg_sleep_hours = rows.iter().map(|r| r.sleep_hours).sum::<f64>() / count;

    HealthStats {
        total_steps,
        avg_heart_rate: round1(avg_heart_rate),
        avg_sleep_hours: round1(avg_sleep_hours),
        activity_level: activity_level(avg_steps).to_string(),
        health_score: health_score(avg_steps, avg_sleep_hours, avg_heart_rate),
        weekly_goal_progress: (total_steps * 100 / WEEKLY_STEP_GOAL).min(100),
    }
}

/// Uploaded wearable data and its weekly summary
pub struct HealthDataService {
    store: HealthDataStore,
}

impl HealthDataService {
    pub fn new(store: HealthDataStore) -> Self {
        Self { store }
    }

    pub async fn upload(
        &self,
        user_id: i64,
        request: UploadHealthDataRequest,
    ) -> Result<HealthRecord, HealthDataServiceError> {
        request
            .validate()
            .map_err(|errors| HealthDataServiceError::ValidationError(flatten_validation_errors(&errors)))?;

        let row = self
            .store
            .create(user_id, convert_to_new_health_data(&request))
            .await
            .map_err(map_repo_error)?;
        info!(user_id, id = row.id, date = %row.date, "Stored health data");
        Ok(convert_to_health_record(row))
    }

    /// Newest first
    pub async fn list(&self, user_id: i64) -> Result<Vec<HealthRecord>, HealthDataServiceError> {
        let rows = self.store.list_for_user(user_id).await.map_err(map_repo_error)?;
        debug!(user_id, count = rows.len(), "Listed health data");
        Ok(rows.into_iter().map(convert_to_health_record).collect())
    }

    /// Statistics over the latest week of uploads
    pub async fn stats(&self, user_id: i64) -> Result<HealthStats, HealthDataServiceError> {
        let mut rows = self.store.list_for_user(user_id).await.map_err(map_repo_error)?;
        rows.truncate(STATS_WINDOW_DAYS);
        Ok(compute_stats(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use voice_companion_data::repository::mocks::MockHealthDataRepository;

    fn upload(day: u32, steps: i64, heart_rate: i64, sleep_hours: f64) -> UploadHealthDataRequest {
        UploadHealthDataRequest {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            steps,
            heart_rate,
            sleep_hours,
            calories: None,
            distance: None,
        }
    }

    fn service() -> HealthDataService {
        HealthDataService::new(Arc::new(MockHealthDataRepository::new()))
    }

    #[tokio::test]
    async fn test_upload_and_list() {
        let service = service();
        let first = service.upload(1, upload(1, 8000, 72, 7.5)).await.unwrap();
        service.upload(1, upload(2, 7500, 70, 8.0)).await.unwrap();
        service.upload(2, upload(3, 100, 60, 5.0)).await.unwrap();

        assert_eq!(first.steps, 8000);
        let rows = service.list(1).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }

    #[tokio::test]
    async fn test_upload_validation() {
        match service().upload(1, upload(1, -5, 72, 30.0)).await {
            Err(HealthDataServiceError::ValidationError(msg)) => {
                assert!(msg.contains("steps"));
                assert!(msg.contains("sleep_hours"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_from_rows() {
        let service = service();
        service.upload(1, upload(1, 8000, 72, 7.5)).await.unwrap();
        service.upload(1, upload(2, 7500, 70, 8.0)).await.unwrap();
        service.upload(1, upload(3, 9000, 75, 7.0)).await.unwrap();

        let stats = service.stats(1).await.unwrap();
        assert_eq!(stats.total_steps, 24500);
        assert_eq!(stats.avg_heart_rate, 72.3);
        assert_eq!(stats.avg_sleep_hours, 7.5);
        assert_eq!(stats.activity_level, "中等");
        // 8166.7 / 10000 * 40 = 32.67, plus 30 and 30
        assert_eq!(stats.health_score, 93);
        assert_eq!(stats.weekly_goal_progress, 35);
    }

    #[tokio::test]
    async fn test_stats_use_latest_week_only() {
        let service = service();
        for day in 1..=10 {
            service.upload(1, upload(day, 20000, 65, 8.0)).await.unwrap();
        }
        let stats = service.stats(1).await.unwrap();
        assert_eq!(stats.total_steps, 140_000);
        assert_eq!(stats.weekly_goal_progress, 100);
        assert_eq!(stats.activity_level, "高");
        assert_eq!(stats.health_score, 100);
    }

    #[test]
    fn test_empty_and_poor_stats() {
        assert_eq!(compute_stats(&[]).activity_level, "无数据");
        // 5 hours of sleep loses 20 points, 110 bpm loses 10
        assert_eq!(health_score(0.0, 5.0, 110.0), 30);
    }
}
