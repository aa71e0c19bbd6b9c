use axum::{
    extract::{Json, Path, State},
    response::{IntoResponse, Response},
};
use tracing::{info, instrument};
use validator::Validate;

use voice_companion_domain::services::navigation::PageInfo;
use voice_companion_domain::services::{flatten_validation_errors, NavigationResult, Services};

use crate::entities::navigation::DetectNavigationRequest;
use crate::entities::{ErrorResponse, MessageResponse};

/// Every configured page
#[utoipa::path(
    get,
    path = "/navigation/pages",
    responses((status = 200, description = "Pages", body = [PageInfo])),
    tag = "navigation"
)]
#[instrument(skip(services))]
pub async fn get_pages(State(services): State<Services>) -> impl IntoResponse {
    Json(services.navigation.get_available_pages().await)
}

/// Page by route; the leading slash may be omitted
#[utoipa::path(
    get,
    path = "/navigation/pages/{route}",
    params(("route" = String, Path, description = "Page route")),
    responses(
        (status = 200, description = "Page", body = PageInfo),
        (status = 404, description = "No page with that route", body = ErrorResponse),
    ),
    tag = "navigation"
)]
#[instrument(skip(services))]
pub async fn get_page_by_route(
    State(services): State<Services>,
    Path(route): Path<String>,
) -> Result<impl IntoResponse, Response> {
    let page = match services.navigation.get_page_by_route(&route).await {
        Some(page) => Some(page),
        None => services.navigation.get_page_by_route(&format!("/{}", route)).await,
    };
    page.map(Json)
        .ok_or_else(|| ErrorResponse::not_found("页面不存在").into_response())
}

#[utoipa::path(
    post,
    path = "/navigation/detect",
    request_body = DetectNavigationRequest,
    responses(
        (status = 200, description = "Navigation decision", body = NavigationResult),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    tag = "navigation"
)]
#[instrument(skip(services))]
pub async fn detect_navigation(
    State(services): State<Services>,
    Json(request): Json<DetectNavigationRequest>,
) -> Result<impl IntoResponse, Response> {
    request.validate().map_err(|errors| {
        ErrorResponse::validation_error(&flatten_validation_errors(&errors), None).into_response()
    })?;

    let (result, method) = services.navigation.detect(&request.text, &request.lang).await;
    info!(method, confidence = result.confidence(), "Navigation detected");
    Ok(Json(result))
}

/// Reload the navigation workbook
#[utoipa::path(
    post,
    path = "/navigation/reload",
    responses(
        (status = 200, description = "Reloaded", body = MessageResponse),
        (status = 500, description = "Workbook unavailable", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "navigation"
)]
#[instrument(skip(services))]
pub async fn reload_navigation(State(services): State<Services>) -> Result<impl IntoResponse, Response> {
    if services.navigation.reload().await {
        Ok(Json(MessageResponse::new("导航配置已重新加载")))
    } else {
        Err(ErrorResponse::internal_error_with("重新加载导航配置失败").into_response())
    }
}
