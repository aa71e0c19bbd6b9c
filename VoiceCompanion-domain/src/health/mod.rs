//! Component health checks for the status endpoint

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use voice_companion_data::config_tables::ConfigTables;
use voice_companion_data::database::{describe_pool, DatabasePool};

/// System health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthComponent {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthComponent {
    fn healthy(details: impl Into<String>) -> Self {
        Self { status: ComponentStatus::Healthy, details: Some(details.into()) }
    }

    fn degraded(details: impl Into<String>) -> Self {
        Self { status: ComponentStatus::Degraded, details: Some(details.into()) }
    }

    fn unhealthy(details: impl Into<String>) -> Self {
        Self { status: ComponentStatus::Unhealthy, details: Some(details.into()) }
    }
}

/// Overall health and the status of each component
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SystemHealth {
    pub status: SystemStatus,
    pub components: BTreeMap<String, HealthComponent>,
}

impl SystemHealth {
    /// Unhealthy if the database is down, degraded if anything else is off
    pub fn from_components(components: BTreeMap<String, HealthComponent>) -> Self {
        let database_down = components
            .get("database")
            .map_or(true, |c| c.status == ComponentStatus::Unhealthy);
        let status = if database_down {
            SystemStatus::Unhealthy
        } else if components.values().any(|c| c.status != ComponentStatus::Healthy) {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        };
        Self { status, components }
    }
}

#[async_trait]
pub trait HealthServiceTrait: Send + Sync {
    async fn get_system_health(&self) -> SystemHealth;
}

/// Checks the database pool and the configuration tables
pub struct HealthService {
    pool: DatabasePool,
    config: Arc<ConfigTables>,
}

impl HealthService {
    pub fn new(pool: DatabasePool, config: Arc<ConfigTables>) -> Self {
        Self { pool, config }
    }

    fn check_database(&self) -> HealthComponent {
        let probe = self
            .pool
            .connection()
            .map_err(|e| e.to_string())
            .and_then(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(|e| e.to_string())
            });
        match probe {
            Ok(_) => HealthComponent::healthy(describe_pool(&self.pool)),
            Err(e) => HealthComponent::unhealthy(format!("Database connection error: {}", e)),
        }
    }

    fn check_config_tables(&self) -> HealthComponent {
        let loaded = self.config.list_configs();
        if loaded.is_empty() {
            return HealthComponent::degraded("No configuration tables loaded");
        }
        let report = self.config.check_all_configs_up_to_date();
        if report.all_up_to_date {
            HealthComponent::healthy(format!("{} configuration tables loaded", loaded.len()))
        } else {
            HealthComponent::degraded(format!(
                "Outdated: {}; missing workbooks: {}",
                report.outdated_configs.join(", "),
                report.missing_excel_files.join(", ")
            ))
        }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let mut components = BTreeMap::new();
        components.insert("database".to_string(), self.check_database());
        components.insert("config_tables".to_string(), self.check_config_tables());
        SystemHealth::from_components(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config_tables;
    use voice_companion_data::config_tables::MemoryWorkbooks;
    use voice_companion_data::database::create_in_memory_pool;

    #[tokio::test]
    async fn test_healthy_system() {
        let service = HealthService::new(create_in_memory_pool().unwrap(), sample_config_tables());
        let health = service.get_system_health().await;

        assert_eq!(health.status, SystemStatus::Healthy);
        assert_eq!(health.components["database"].status, ComponentStatus::Healthy);
        assert_eq!(health.components["config_tables"].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_missing_config_degrades() {
        let empty = Arc::new(ConfigTables::new(Arc::new(MemoryWorkbooks::new())));
        let service = HealthService::new(create_in_memory_pool().unwrap(), empty);
        let health = service.get_system_health().await;

        assert_eq!(health.status, SystemStatus::Degraded);
        assert_eq!(health.components["config_tables"].status, ComponentStatus::Degraded);
    }

    #[test]
    fn test_database_down_is_unhealthy() {
        let mut components = BTreeMap::new();
        components.insert("database".to_string(), HealthComponent::unhealthy("gone"));
        components.insert("config_tables".to_string(), HealthComponent::healthy("ok"));
        assert_eq!(SystemHealth::from_components(components).status, SystemStatus::Unhealthy);
    }
}
