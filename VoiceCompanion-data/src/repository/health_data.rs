use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};

use crate::database::DatabasePool;
use crate::models::health_data::{HealthData, NewHealthData};
use super::errors::RepositoryError;

/// Repository trait for uploaded health data
#[async_trait]
pub trait HealthDataRepositoryTrait {
    async fn create(&self, user_id: i64, data: NewHealthData) -> Result<HealthData, RepositoryError>;

    /// All rows of a user, newest date first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<HealthData>, RepositoryError>;
}

/// SQLite-backed health data repository
#[derive(Debug, Clone)]
pub struct HealthDataRepository {
    pool: DatabasePool,
}

impl HealthDataRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_health_data(row: &Row<'_>) -> rusqlite::Result<HealthData> {
    Ok(HealthData {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        steps: row.get(3)?,
        heart_rate: row.get(4)?,
        sleep_hours: row.get(5)?,
        calories: row.get(6)?,
        distance: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[async_trait]
impl HealthDataRepositoryTrait for HealthDataRepository {
    async fn create(&self, user_id: i64, data: NewHealthData) -> Result<HealthData, RepositoryError> {
        if data.steps < 0 || data.heart_rate < 0 || data.sleep_hours < 0.0 {
            return Err(RepositoryError::Validation("health values must not be negative".to_string()));
        }

        let conn = self.pool.connection()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO health_data
                (user_id, date, steps, heart_rate, sleep_hours, calories, distance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                user_id,
                data.date,
                data.steps,
                data.heart_rate,
                data.sleep_hours,
                data.calories,
                data.distance,
                now,
            ],
        )?;

        Ok(HealthData {
            id: conn.last_insert_rowid(),
            user_id,
            date: data.date,
            steps: data.steps,
            heart_rate: data.heart_rate,
            sleep_hours: data.sleep_hours,
            calories: data.calories,
            distance: data.distance,
            created_at: now,
            updated_at: now,
        })
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<HealthData>, RepositoryError> {
        let conn = self.pool.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, date, steps, heart_rate, sleep_hours, calories, distance, created_at, updated_at
             FROM health_data WHERE user_id = ?1 ORDER BY date DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], map_health_data)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Mock health data repository for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockHealthDataRepository {
        rows: Mutex<Vec<HealthData>>,
    }

    impl MockHealthDataRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl HealthDataRepositoryTrait for MockHealthDataRepository {
        async fn create(&self, user_id: i64, data: NewHealthData) -> Result<HealthData, RepositoryError> {
            let mut rows = self.rows.lock()?;
            let now = Utc::now();
            let row = HealthData {
                id: rows.len() as i64 + 1,
                user_id,
                date: data.date,
                steps: data.steps,
                heart_rate: data.heart_rate,
                sleep_hours: data.sleep_hours,
                calories: data.calories,
                distance: data.distance,
                created_at: now,
                updated_at: now,
            };
            rows.push(row.clone());
            Ok(row)
        }

        async fn list_for_user(&self, user_id: i64) -> Result<Vec<HealthData>, RepositoryError> {
            let mut rows: Vec<_> = self
                .rows
                .lock()?
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
            Ok(rows)
        }
    }

}
