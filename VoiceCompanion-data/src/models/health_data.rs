use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for one day of uploaded health data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthData {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub steps: i64,
    pub heart_rate: i64,
    pub sleep_hours: f64,
    pub calories: Option<i64>,
    /// Kilometres
    pub distance: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for storing a health data row
#[derive(Debug, Clone)]
pub struct NewHealthData {
    pub date: NaiveDate,
    pub steps: i64,
    pub heart_rate: i64,
    pub sleep_hours: f64,
    pub calories: Option<i64>,
    pub distance: Option<f64>,
}
