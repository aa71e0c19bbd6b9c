use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Loaded configuration tables and how they compare with their workbooks
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigStatusResponse {
    pub loaded_configs: Vec<String>,
    /// Per-workbook freshness report
    #[schema(value_type = Object)]
    pub freshness: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfigReloadResponse {
    pub message: String,
    /// Table name to whether it loaded
    pub results: BTreeMap<String, bool>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct StatisticsQuery {
    /// Window in days (default: 7)
    pub days: Option<i64>,
}

impl StatisticsQuery {
    pub fn days(&self) -> i64 {
        self.days.unwrap_or(7)
    }
}
