use axum::http::StatusCode;
use serde_json::json;

use super::*;

#[tokio::test]
async fn test_list_pages() {
    let response = get(test_app(), "/navigation/pages").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    let routes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|page| page["route"].as_str().unwrap())
        .collect();
    assert!(routes.contains(&"/health"));
    assert!(routes.contains(&"/settings"));
}

#[tokio::test]
async fn test_page_by_route_without_leading_slash() {
    let response = get(test_app(), "/navigation/pages/settings").await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(body_json(response).await["route"], "/settings");
}

#[tokio::test]
async fn test_unknown_page_is_not_found() {
    let response = get(test_app(), "/navigation/pages/nowhere").await;
    assert_status(&response, StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "页面不存在");
}

#[tokio::test]
async fn test_detect_keyword_navigation() {
    let response = post_json(test_app(), "/navigation/detect", json!({"text": "看健康数据"})).await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["type"], "page_navigation");
    assert_eq!(body["route"], "/health");
}

#[tokio::test]
async fn test_detect_rejects_empty_text() {
    let response = post_json(test_app(), "/navigation/detect", json!({"text": ""})).await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reload_requires_token() {
    let response = post_json(test_app(), "/navigation/reload", json!({})).await;
    assert_status(&response, StatusCode::UNAUTHORIZED);
}
