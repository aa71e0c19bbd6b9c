use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use voice_companion_data::models::{User, UserProfileUpdate};
use voice_companion_data::repository::{RepositoryError, UserRepositoryTrait};

use crate::auth::logging::{
    log_auth_event, log_failed_login, log_logout, log_successful_login, log_token_refresh, AuthEvent, AuthEventType,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{self, SecurityError, TokenType};
use crate::auth::{roles_for, Claims};
use crate::services::flatten_validation_errors;
use crate::entities::conversions::{convert_to_new_user, convert_to_user_profile};
use crate::entities::user::{
    AuthSession, ChangePasswordRequest, LoginRequest, ProfileUpdateRequest, RegisterRequest, SpeechPreferences,
    UserProfile,
};

pub type UserStore = Arc<dyn UserRepositoryTrait + Send + Sync>;

/// Preference key holding [`SpeechPreferences`]
pub const SPEECH_PREFERENCES_KEY: &str = "voice";

/// User service errors
#[derive(Debug, Error)]
pub enum UserServiceError {
    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found: {0}")]
    NotFound(String),

    /// Username already taken
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials or an unusable token
    #[error("{0}")]
    Unauthorized(String),

    /// The current password did not match
    #[error("旧密码错误")]
    WrongPassword,

    #[error("Security error: {0}")]
    Security(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),
}

fn map_repo_error(err: RepositoryError) -> UserServiceError {
    match err {
        RepositoryError::NotFound(msg) => UserServiceError::NotFound(msg),
        RepositoryError::Validation(msg) => UserServiceError::ValidationError(msg),
        RepositoryError::Conflict(_) => UserServiceError::Conflict("用户名已存在".to_string()),
        other => UserServiceError::RepositoryError(other.to_string()),
    }
}

fn map_security_error(err: SecurityError) -> UserServiceError {
    UserServiceError::Security(err.to_string())
}

fn validate(request: &impl Validate) -> Result<(), UserServiceError> {
    request
        .validate()
        .map_err(|errors| UserServiceError::ValidationError(flatten_validation_errors(&errors)))
}

/// Accounts, credentials and stored preferences
pub struct UserService {
    users: UserStore,
}

impl UserService {
    pub fn new(users: UserStore) -> Self {
        Self { users }
    }

    async fn load(&self, user_id: i64) -> Result<User, UserServiceError> {
        self.users
            .get_by_id(user_id)
            .await
            .map_err(map_repo_error)?
            .ok_or_else(|| UserServiceError::NotFound(user_id.to_string()))
    }

    fn issue_tokens(&self, user: &User) -> Result<AuthSession, UserServiceError> {
        let roles = roles_for(&user.username);
        let session_id = Uuid::new_v4().to_string();
        let token =
            token::generate_session_token(user.id, &user.username, TokenType::Access, Some(roles.clone()), &session_id)
                .map_err(map_security_error)?;
        let refresh_token =
            token::generate_session_token(user.id, &user.username, TokenType::Refresh, Some(roles), &session_id)
                .map_err(map_security_error)?;

        Ok(AuthSession {
            user: convert_to_user_profile(user),
            token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: TokenType::Access.expiration().num_seconds(),
        })
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, UserServiceError> {
        validate(&request)?;

        if self
            .users
            .get_by_username(request.username.trim())
            .await
            .map_err(map_repo_error)?
            .is_some()
        {
            return Err(UserServiceError::Conflict("用户名已存在".to_string()));
        }

        let password_hash = hash_password(&request.password).map_err(map_security_error)?;
        let user = self
            .users
            .create(convert_to_new_user(&request, password_hash))
            .await
            .map_err(map_repo_error)?;

        info!(user_id = user.id, username = %user.username, "Registered user");
        log_auth_event(AuthEvent::new(AuthEventType::Registration, Some(&user.id.to_string()), true));
        self.issue_tokens(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, UserServiceError> {
        validate(&request)?;

        let rejected = || UserServiceError::Unauthorized("用户名或密码错误".to_string());
        let Some(user) = self
            .users
            .get_by_username(request.username.trim())
            .await
            .map_err(map_repo_error)?
        else {
            log_failed_login(&request.username, "unknown username");
            return Err(rejected());
        };

        if !verify_password(&request.password, &user.password_hash) {
            log_failed_login(&request.username, "wrong password");
            return Err(rejected());
        }

        self.users.touch_last_login(user.id).await.map_err(map_repo_error)?;
        let user = self.load(user.id).await?;
        log_successful_login(&user.id.to_string());
        self.issue_tokens(&user)
    }

    /// New access token for a valid refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, i64), UserServiceError> {
        let claims = match token::validate_token_of_type(refresh_token, TokenType::Refresh) {
            Ok(claims) => claims,
            Err(SecurityError::TokenExpired) => {
                log_token_refresh("unknown", false, Some("expired"));
                return Err(UserServiceError::Unauthorized("Token已过期".to_string()));
            }
            Err(e) => {
                log_token_refresh("unknown", false, Some(&e.to_string()));
                return Err(UserServiceError::Unauthorized("无效的Token".to_string()));
            }
        };

        let user_id = claims
            .user_id()
            .ok_or_else(|| UserServiceError::Unauthorized("无效的Token".to_string()))?;
        let user = match self.users.get_by_id(user_id).await.map_err(map_repo_error)? {
            Some(user) => user,
            None => return Err(UserServiceError::Unauthorized("用户不存在".to_string())),
        };

        let access = token::generate_session_token(
            user.id,
            &user.username,
            TokenType::Access,
            Some(roles_for(&user.username)),
            &claims.sid,
        )
        .map_err(map_security_error)?;
        log_token_refresh(&claims.sub, true, None);
        Ok((access, TokenType::Access.expiration().num_seconds()))
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<UserProfile, UserServiceError> {
        self.load(user_id).await.map(|user| convert_to_user_profile(&user))
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: ProfileUpdateRequest,
    ) -> Result<UserProfile, UserServiceError> {
        validate(&request)?;

        let preferences = match request.preferences {
            Some(Value::Object(map)) => Some(Value::Object(map).to_string()),
            Some(Value::Null) | None => None,
            Some(_) => {
                return Err(UserServiceError::ValidationError(
                    "preferences: Preferences must be a JSON object".to_string(),
                ))
            }
        };

        let update = UserProfileUpdate {
            full_name: request.full_name,
            email: request.email,
            avatar_url: request.avatar_url,
            age: request.age,
            region: request.region,
            preferences,
        };
        let user = self.users.update_profile(user_id, update).await.map_err(map_repo_error)?;
        info!(user_id, "Updated user profile");
        Ok(convert_to_user_profile(&user))
    }

    pub async fn change_password(&self, user_id: i64, request: ChangePasswordRequest) -> Result<(), UserServiceError> {
        validate(&request)?;

        let user = self.load(user_id).await?;
        if !verify_password(&request.old_password, &user.password_hash) {
            log_auth_event(
                AuthEvent::new(AuthEventType::PasswordChange, Some(&user_id.to_string()), false)
                    .with_details("old password mismatch"),
            );
            return Err(UserServiceError::WrongPassword);
        }

        let password_hash = hash_password(&request.new_password).map_err(map_security_error)?;
        self.users
            .update_password(user_id, &password_hash)
            .await
            .map_err(map_repo_error)?;
        log_auth_event(AuthEvent::new(AuthEventType::PasswordChange, Some(&user_id.to_string()), true));
        Ok(())
    }

    /// Revoke the presented token together with its refresh token
    pub fn logout(&self, claims: &Claims) -> Result<(), UserServiceError> {
        token::revoke_session(claims).map_err(|e| {
            error!("Failed to revoke token: {}", e);
            map_security_error(e)
        })?;
        log_logout(&claims.sub);
        Ok(())
    }

    pub async fn get_preferences(&self, user_id: i64) -> Result<Map<String, Value>, UserServiceError> {
        Ok(self.load(user_id).await?.preferences_json())
    }

    /// Replace all stored preferences
    pub async fn update_preferences(
        &self,
        user_id: i64,
        preferences: Map<String, Value>,
    ) -> Result<Map<String, Value>, UserServiceError> {
        let update = UserProfileUpdate {
            preferences: Some(Value::Object(preferences).to_string()),
            ..Default::default()
        };
        let user = self.users.update_profile(user_id, update).await.map_err(map_repo_error)?;
        Ok(user.preferences_json())
    }

    /// Stored speech settings, defaults for anything missing
    pub async fn get_speech_preferences(&self, user_id: i64) -> Result<SpeechPreferences, UserServiceError> {
        let preferences = self.get_preferences(user_id).await?;
        Ok(preferences
            .get(SPEECH_PREFERENCES_KEY)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default())
    }

    /// Store speech settings, keeping every other preference
    pub async fn update_speech_preferences(
        &self,
        user_id: i64,
        speech: SpeechPreferences,
    ) -> Result<SpeechPreferences, UserServiceError> {
        let mut preferences = self.get_preferences(user_id).await?;
        let value = serde_json::to_value(&speech).map_err(|e| UserServiceError::ValidationError(e.to_string()))?;
        preferences.insert(SPEECH_PREFERENCES_KEY.to_string(), value);
        self.update_preferences(user_id, preferences).await?;
        Ok(speech)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use voice_companion_data::repository::mocks::MockUserRepository;

    fn service() -> UserService {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_only");
        std::env::set_var("JWT_ISSUER", "test-issuer");
        UserService::new(Arc::new(MockUserRepository::new()))
    }

    fn registration(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
            full_name: None,
            email: None,
            age: Some(-3),
            region: Some(String::new()),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = service();
        let session = service.register(registration("alice")).await.unwrap();
        assert_eq!(session.user.username, "alice");
        assert!(session.user.age.is_none());
        assert!(session.user.region.is_none());
        assert!(!session.token.is_empty());

        let login = service
            .login(LoginRequest { username: "alice".to_string(), password: "secret123".to_string() })
            .await
            .unwrap();
        assert!(login.user.last_login_at.is_some());
        let claims = token::validate_token(&login.token).unwrap();
        assert_eq!(claims.token_type, "access");
    }

    #[tokio::test]
    async fn test_duplicate_and_bad_credentials() {
        let service = service();
        service.register(registration("bob")).await.unwrap();
        match service.register(registration("bob")).await {
            Err(UserServiceError::Conflict(msg)) => assert_eq!(msg, "用户名已存在"),
            other => panic!("unexpected {:?}", other.map(|s| s.user)),
        }

        let wrong = service
            .login(LoginRequest { username: "bob".to_string(), password: "nope".to_string() })
            .await;
        assert!(matches!(wrong, Err(UserServiceError::Unauthorized(ref m)) if m == "用户名或密码错误"));
    }

    #[tokio::test]
    async fn test_validation_is_flattened() {
        let mut request = registration("x");
        request.password = "123".to_string();
        match service().register(request).await {
            Err(UserServiceError::ValidationError(msg)) => {
                assert!(msg.contains("username: Username must be 3 to 50 characters"));
                assert!(msg.contains("password: Password must be at least 6 characters"));
            }
            other => panic!("unexpected {:?}", other.map(|s| s.user)),
        }
    }

    #[tokio::test]
    async fn test_refresh_issues_access_token() {
        let service = service();
        let session = service.register(registration("carol")).await.unwrap();

        let (access, expires_in) = service.refresh(&session.refresh_token).await.unwrap();
        assert_eq!(token::validate_token(&access).unwrap().token_type, "access");
        assert!(expires_in > 0);

        assert!(matches!(
            service.refresh(&session.token).await,
            Err(UserServiceError::Unauthorized(ref m)) if m == "无效的Token"
        ));
    }

    #[tokio::test]
    async fn test_logout_ends_refresh_token() {
        let service = service();
        let session = service.register(registration("gina")).await.unwrap();
        let (refreshed, _) = service.refresh(&session.refresh_token).await.unwrap();
        let other = service
            .login(LoginRequest { username: "gina".to_string(), password: "secret123".to_string() })
            .await
            .unwrap();

        let claims = token::validate_token(&session.token).unwrap();
        service.logout(&claims).unwrap();

        assert!(token::validate_token(&session.token).is_err());
        assert!(token::validate_token(&refreshed).is_err());
        assert!(matches!(
            service.refresh(&session.refresh_token).await,
            Err(UserServiceError::Unauthorized(ref m)) if m == "无效的Token"
        ));

        // A separate login keeps working
        assert!(token::validate_token(&other.token).is_ok());
        assert!(service.refresh(&other.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password() {
        let service = service();
        let id = service.register(registration("dave")).await.unwrap().user.id;

        let wrong = ChangePasswordRequest { old_password: "bad".to_string(), new_password: "newpass1".to_string() };
        assert!(matches!(service.change_password(id, wrong).await, Err(UserServiceError::WrongPassword)));

        let ok = ChangePasswordRequest { old_password: "secret123".to_string(), new_password: "newpass1".to_string() };
        service.change_password(id, ok).await.unwrap();
        service
            .login(LoginRequest { username: "dave".to_string(), password: "newpass1".to_string() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_preferences_and_speech_settings() {
        let service = service();
        let id = service.register(registration("erin")).await.unwrap().user.id;
        assert!(service.get_preferences(id).await.unwrap().is_empty());
        assert_eq!(service.get_speech_preferences(id).await.unwrap(), SpeechPreferences::default());

        let mut prefs = Map::new();
        prefs.insert("theme".to_string(), json!("dark"));
        service.update_preferences(id, prefs).await.unwrap();

        let speech = SpeechPreferences { voice_speed: 1.3, ..Default::default() };
        service.update_speech_preferences(id, speech.clone()).await.unwrap();

        let stored = service.get_preferences(id).await.unwrap();
        assert_eq!(stored["theme"], "dark");
        assert_eq!(stored["voice"]["voice_speed"], 1.3);
        assert_eq!(service.get_speech_preferences(id).await.unwrap(), speech);
    }

    #[tokio::test]
    async fn test_profile_preferences_must_be_object() {
        let service = service();
        let id = service.register(registration("frank")).await.unwrap().user.id;

        let bad = ProfileUpdateRequest { preferences: Some(json!([1, 2])), ..Default::default() };
        assert!(matches!(service.update_profile(id, bad).await, Err(UserServiceError::ValidationError(_))));

        let good = ProfileUpdateRequest { full_name: Some("Frank".to_string()), ..Default::default() };
        assert_eq!(service.update_profile(id, good).await.unwrap().full_name.as_deref(), Some("Frank"));
    }
}
