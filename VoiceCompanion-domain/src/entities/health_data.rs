use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// One day of wearable data uploaded by the client
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UploadHealthDataRequest {
    /// Calendar day, `YYYY-MM-DD`
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,

    #[validate(range(min = 0, max = 200000, message = "Steps must be between 0 and 200000"))]
    pub steps: i64,

    #[validate(range(min = 0, max = 300, message = "Heart rate must be between 0 and 300"))]
    pub heart_rate: i64,

    #[validate(range(min = 0.0, max = 24.0, message = "Sleep hours must be between 0 and 24"))]
    pub sleep_hours: f64,

    #[validate(range(min = 0, message = "Calories cannot be negative"))]
    pub calories: Option<i64>,

    /// Kilometres
    #[validate(range(min = 0.0, message = "Distance cannot be negative"))]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRecord {
    pub id: i64,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub steps: i64,
    pub heart_rate: i64,
    pub sleep_hours: f64,
    pub calories: Option<i64>,
    pub distance: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Aggregates over the latest week of uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthStats {
    pub total_steps: i64,
    pub avg_heart_rate: f64,
    pub avg_sleep_hours: f64,
    /// 低, 中等, 高, or 无数据 when nothing was uploaded
    pub activity_level: String,
    /// 0 to 100
    pub health_score: i64,
    /// Percent of the weekly step goal, capped at 100
    pub weekly_goal_progress: i64,
}
