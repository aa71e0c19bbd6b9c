use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use voice_companion_domain::services::{
    HealthDataServiceError, InteractionServiceError, SessionServiceError, UserServiceError,
};

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Create a not found error response
    pub fn not_found(message: &str) -> Self {
        Self::new("not_found", message)
    }

    /// Create a validation error response
    pub fn validation_error(message: &str, details: Option<serde_json::Value>) -> Self {
        Self {
            details,
            ..Self::new("validation_error", message)
        }
    }

    /// Create a bad request error response
    pub fn bad_request(message: &str) -> Self {
        Self::new("bad_request", message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new("unauthorized", message)
    }

    /// Duplicate resource; reported as 400 like other client mistakes
    pub fn conflict(message: &str) -> Self {
        Self::new("conflict", message)
    }

    /// Create an internal error response
    pub fn internal_error() -> Self {
        Self::new("internal_error", "An unexpected error occurred")
    }

    pub fn internal_error_with(message: &str) -> Self {
        Self::new("internal_error", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" | "bad_request" | "conflict" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self { message: message.to_string() }
    }
}

/// Message shown when a session is missing, closed or belongs to someone else
pub const SESSION_NOT_FOUND: &str = "会话不存在或无权限访问";

impl From<UserServiceError> for ErrorResponse {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => {
                warn!("Invalid user request: {}", msg);
                ErrorResponse::validation_error(&msg, None)
            }
            UserServiceError::NotFound(_) => ErrorResponse::not_found("用户不存在"),
            UserServiceError::Conflict(msg) => ErrorResponse::conflict(&msg),
            UserServiceError::Unauthorized(msg) => ErrorResponse::unauthorized(&msg),
            UserServiceError::WrongPassword => ErrorResponse::bad_request(&err.to_string()),
            UserServiceError::Security(msg) | UserServiceError::RepositoryError(msg) => {
                error!("User service failure: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<SessionServiceError> for ErrorResponse {
    fn from(err: SessionServiceError) -> Self {
        match err {
            SessionServiceError::NotFound(_) => ErrorResponse::not_found(SESSION_NOT_FOUND),
            SessionServiceError::RepositoryError(msg) => {
                error!("Session service failure: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<HealthDataServiceError> for ErrorResponse {
    fn from(err: HealthDataServiceError) -> Self {
        match err {
            HealthDataServiceError::ValidationError(msg) => ErrorResponse::validation_error(&msg, None),
            HealthDataServiceError::RepositoryError(msg) => {
                error!("Health data failure: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<InteractionServiceError> for ErrorResponse {
    fn from(err: InteractionServiceError) -> Self {
        match err {
            InteractionServiceError::ValidationError(msg) => ErrorResponse::validation_error(&msg, None),
            InteractionServiceError::RepositoryError(msg) => {
                error!("Interaction log failure: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_code() {
        assert_eq!(ErrorResponse::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorResponse::conflict("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorResponse::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorResponse::internal_error().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_user_errors_keep_their_messages() {
        let response = ErrorResponse::from(UserServiceError::Conflict("用户名已存在".to_string()));
        assert_eq!(response.error, "conflict");
        assert_eq!(response.message, "用户名已存在");

        let response = ErrorResponse::from(UserServiceError::WrongPassword);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.message, "旧密码错误");
    }

    #[test]
    fn test_session_not_found_message() {
        let response = ErrorResponse::from(SessionServiceError::NotFound("abc".to_string()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.message, SESSION_NOT_FOUND);
    }
}
