use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub full_name: Option<String>,

    #[validate(email(message = "Must be a valid email address"))]
    pub email: Option<String>,

    /// Values of zero or below are stored as unknown
    pub age: Option<i32>,

    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Profile changes; absent fields stay as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProfileUpdateRequest {
    #[validate(length(max = 100, message = "Full name is too long"))]
    pub full_name: Option<String>,

    #[validate(email(message = "Must be a valid email address"))]
    pub email: Option<String>,

    #[validate(url(message = "Must be a valid URL"))]
    pub avatar_url: Option<String>,

    #[validate(range(min = 1, max = 150, message = "Age must be between 1 and 150"))]
    pub age: Option<i32>,

    pub region: Option<String>,

    #[schema(value_type = Option<Object>)]
    pub preferences: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// User as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Always an object, empty when nothing is stored
    #[schema(value_type = Object)]
    pub preferences: Map<String, Value>,
}

/// Tokens issued at registration and login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub user: UserProfile,
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Speech settings kept under the `voice` preference key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SpeechPreferences {
    pub default_language: String,
    pub voice_speed: f64,
    pub voice_pitch: f64,
    pub auto_play: bool,
    pub voice_type: String,
}

impl Default for SpeechPreferences {
    fn default() -> Self {
        Self {
            default_language: "zh".to_string(),
            voice_speed: 1.0,
            voice_pitch: 1.0,
            auto_play: true,
            voice_type: "female".to_string(),
        }
    }
}
