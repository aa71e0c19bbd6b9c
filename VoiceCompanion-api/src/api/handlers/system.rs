use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::OnceCell;
use tracing::{info, instrument, warn};

use voice_companion_domain::health::{ComponentStatus, HealthServiceTrait, SystemStatus};
use voice_companion_domain::services::Services;

use crate::entities::system::{ComponentHealthStatus, HealthResponse, PingResponse, RootResponse};

// Set once when the server starts
static SERVER_START_TIME: OnceCell<u64> = OnceCell::new();
static INIT: Once = Once::new();

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn initialize_server_start_time() {
    INIT.call_once(|| {
        let _ = SERVER_START_TIME.set(unix_now());
    });
}

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = RootResponse)),
    tag = "system"
)]
#[instrument]
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "AI助手API服务".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/api-docs".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/ping",
    responses((status = 200, description = "Liveness probe", body = PingResponse)),
    tag = "system"
)]
#[instrument]
pub async fn ping() -> impl IntoResponse {
    Json(PingResponse {
        message: "pong".to_string(),
        status: "healthy".to_string(),
    })
}

fn component_status_label(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "ok",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "error",
    }
}

/// Database and configuration table health
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Everything is healthy", body = HealthResponse),
        (status = 503, description = "Degraded or unhealthy", body = HealthResponse)
    ),
    tag = "system"
)]
#[instrument(skip(services))]
pub async fn health_check(State(services): State<Services>) -> impl IntoResponse {
    let now = unix_now();
    let uptime = SERVER_START_TIME.get().map(|&start| now.saturating_sub(start));
    let system_health = services.health.get_system_health().await;

    let status = match system_health.status {
        SystemStatus::Healthy => "ok",
        SystemStatus::Degraded => "degraded",
        SystemStatus::Unhealthy => "error",
    };
    if system_health.status == SystemStatus::Healthy {
        info!("Health check passed");
    } else {
        warn!(status, "Health check reported problems");
    }

    let components = system_health
        .components
        .into_iter()
        .map(|(name, component)| {
            let entry = ComponentHealthStatus {
                status: component_status_label(component.status).to_string(),
                message: component.details,
            };
            (name, entry)
        })
        .collect();

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime,
        components,
        environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
    };

    let code = if system_health.status == SystemStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
