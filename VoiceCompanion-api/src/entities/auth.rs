use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use voice_companion_domain::entities::{AuthSession, UserProfile};

/// Body returned by `POST /auth/register`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserProfile,
    pub token: String,
    pub refresh_token: String,
}

impl From<AuthSession> for RegisterResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            message: "注册成功".to_string(),
            user: session.user,
            token: session.token,
            refresh_token: session.refresh_token,
        }
    }
}

/// Body returned by `POST /auth/login`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl From<AuthSession> for LoginResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user,
            token: session.token,
            refresh_token: session.refresh_token,
            token_type: session.token_type,
            expires_in: session.expires_in,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PreferencesResponse {
    #[schema(value_type = Object)]
    pub preferences: Map<String, Value>,
}

