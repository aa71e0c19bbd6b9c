//! Maintenance endpoints, mounted behind the admin guard

use axum::{
    extract::{Json, Path, Query, State},
    response::{IntoResponse, Response},
};
use tracing::{info, instrument, warn};

use voice_companion_domain::services::Services;

use crate::entities::admin::{ConfigReloadResponse, ConfigStatusResponse, StatisticsQuery};
use crate::entities::ErrorResponse;

#[utoipa::path(
    get,
    path = "/api/v1/admin/configs/status",
    responses(
        (status = 200, description = "Loaded tables and workbook freshness", body = ConfigStatusResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(services))]
pub async fn get_config_status(State(services): State<Services>) -> Result<impl IntoResponse, Response> {
    let freshness = serde_json::to_value(services.config.check_all_configs_up_to_date())
        .map_err(|e| ErrorResponse::internal_error_with(&e.to_string()).into_response())?;
    Ok(Json(ConfigStatusResponse {
        loaded_configs: services.config.list_configs(),
        freshness,
    }))
}

/// Reload every workbook from disk
#[utoipa::path(
    post,
    path = "/api/v1/admin/configs/reload",
    responses(
        (status = 200, description = "Per-table reload result", body = ConfigReloadResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(services))]
pub async fn reload_configs(State(services): State<Services>) -> impl IntoResponse {
    let results = services.config.reload_all_configs();
    let failed = results.values().filter(|loaded| !**loaded).count();
    if failed > 0 {
        warn!(failed, total = results.len(), "Some configuration tables failed to reload");
    } else {
        info!(total = results.len(), "Configuration tables reloaded");
    }
    Json(ConfigReloadResponse {
        message: "配置重新加载完成".to_string(),
        results,
    })
}

/// Check a workbook's layout without loading it
#[utoipa::path(
    get,
    path = "/api/v1/admin/configs/{name}/validate",
    params(("name" = String, Path, description = "Configuration table name")),
    responses(
        (status = 200, description = "Validation report"),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(services))]
pub async fn validate_config(State(services): State<Services>, Path(name): Path<String>) -> impl IntoResponse {
    let report = services.config.validate_config(&name);
    if !report.valid {
        warn!(config = %name, errors = report.errors.len(), "Workbook failed validation");
    }
    Json(report)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/interactions/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Interaction counts by intent and language"),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(services))]
pub async fn get_interaction_statistics(
    State(services): State<Services>,
    Query(query): Query<StatisticsQuery>,
) -> Result<impl IntoResponse, Response> {
    let statistics = services
        .interactions
        .statistics(query.days())
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(statistics))
}
