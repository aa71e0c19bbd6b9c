use std::sync::Arc;

use axum::http::StatusCode;

use voice_companion_data::config_tables::{ConfigTables, MemoryWorkbooks};

use super::*;

#[tokio::test]
async fn test_root_banner() {
    let response = get(test_app(), "/").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "AI助手API服务");
    assert_eq!(body["docs"], "/api-docs");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ping() {
    let body = body_json(get(test_app(), "/ping").await).await;
    assert_eq!(body["message"], "pong");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_reports_components() {
    let response = get(test_app(), "/api/v1/health").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["database"]["status"], "ok");
    assert_eq!(body["components"]["config_tables"]["status"], "ok");
    assert!(body["timestamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_health_without_config_is_unavailable() {
    let empty = Arc::new(ConfigTables::new(Arc::new(MemoryWorkbooks::new())));
    let services = Services::new(create_in_memory_pool().unwrap(), empty, Providers::default());

    let response = get(create_app(services), "/api/v1/health").await;
    assert_status(&response, StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["config_tables"]["status"], "degraded");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let response = get(test_app(), "/api-docs/openapi.json").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["paths"]["/speech/tts"].is_object());
}

#[tokio::test]
async fn test_admin_requires_token() {
    let response = get(test_app(), "/api/v1/admin/configs/status").await;
    assert_status(&response, StatusCode::UNAUTHORIZED);
}
