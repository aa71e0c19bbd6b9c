use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use voice_companion_data::database::create_in_memory_pool;
use voice_companion_domain::services::{Providers, Services};
use voice_companion_domain::testing::sample_config_tables;

use crate::api::routes::create_app;

mod navigation_test;
mod system_test;

fn test_services() -> Services {
    Services::new(create_in_memory_pool().unwrap(), sample_config_tables(), Providers::default())
}

fn test_app() -> Router {
    create_app(test_services())
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status for response");
}
