use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body returned by `POST /health/upload`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub user_id: i64,
    /// Id of the stored row
    pub id: i64,
}
