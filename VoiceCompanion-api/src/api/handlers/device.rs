use axum::{
    extract::Json,
    response::{IntoResponse, Response},
    Extension,
};
use tracing::{info, instrument};
use validator::Validate;

use voice_companion_domain::auth::UserInfo;
use voice_companion_domain::services::flatten_validation_errors;

use crate::entities::device::{DeviceConnectRequest, DeviceConnectResponse};
use crate::entities::ErrorResponse;

/// Acknowledge a wearable pairing
#[utoipa::path(
    post,
    path = "/device/connect",
    request_body = DeviceConnectRequest,
    responses(
        (status = 200, description = "Device connected", body = DeviceConnectResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "device"
)]
#[instrument(skip(user, request), fields(user_id = user.user_id))]
pub async fn connect_device(
    Extension(user): Extension<UserInfo>,
    Json(request): Json<DeviceConnectRequest>,
) -> Result<impl IntoResponse, Response> {
    request.validate().map_err(|errors| {
        ErrorResponse::validation_error(&flatten_validation_errors(&errors), None).into_response()
    })?;

    info!(device_type = %request.device_type, "Device connected");
    Ok(Json(DeviceConnectResponse {
        message: format!("{} 设备连接成功", request.device_type),
        status: "connected".to_string(),
    }))
}
