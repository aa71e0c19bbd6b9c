use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeviceConnectRequest {
    #[validate(length(min = 1, max = 50, message = "Device type must be 1 to 50 characters"))]
    pub device_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceConnectResponse {
    pub message: String,
    pub status: String,
}
