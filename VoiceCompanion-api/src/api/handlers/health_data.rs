use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
    Extension,
};
use tracing::{info, instrument, warn};
use validator::Validate;

use voice_companion_domain::auth::UserInfo;
use voice_companion_domain::entities::{HealthRecord, HealthStats, UploadHealthDataRequest};
use voice_companion_domain::services::{flatten_validation_errors, Services};

use crate::entities::health_data::UploadResponse;
use crate::entities::ErrorResponse;

/// Uploaded rows, newest first
#[utoipa::path(
    get,
    path = "/health/data",
    responses((status = 200, description = "Health data rows", body = [HealthRecord])),
    security(("bearer" = [])),
    tag = "health-data"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_health_data(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, Response> {
    let records = services
        .health_data
        .list(user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(records))
}

#[utoipa::path(
    post,
    path = "/health/upload",
    request_body = UploadHealthDataRequest,
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "health-data"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn upload_health_data(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<UploadHealthDataRequest>,
) -> Result<impl IntoResponse, Response> {
    if let Err(errors) = request.validate() {
        let message = flatten_validation_errors(&errors);
        warn!("Invalid health data upload: {}", message);
        return Err(ErrorResponse::validation_error(&message, None).into_response());
    }

    let record = services
        .health_data
        .upload(user.user_id, request)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    info!(record_id = record.id, date = %record.date, "Health data uploaded");

    Ok(Json(UploadResponse {
        message: "上传成功".to_string(),
        user_id: user.user_id,
        id: record.id,
    }))
}

/// Aggregates over the latest week of uploads
#[utoipa::path(
    get,
    path = "/health/stats",
    responses((status = 200, description = "Weekly statistics", body = HealthStats)),
    security(("bearer" = [])),
    tag = "health-data"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_health_stats(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, Response> {
    let stats = services
        .health_data
        .stats(user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(stats))
}
