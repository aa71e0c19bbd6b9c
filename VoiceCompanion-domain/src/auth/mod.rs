//! Authentication for the VoiceCompanion API
//!
//! Bearer JWTs issued at login/registration, a revocation list, role checks
//! and the auth event log.

use std::env;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use voice_companion_data::models::User;
use voice_companion_data::repository::UserRepositoryTrait;

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};

pub mod authorize;
pub mod logging;
pub mod password;
pub mod token;
pub mod token_blacklist;

/// Authentication claims for JSON Web Tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Username
    pub name: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Token id, the revocation key
    pub jti: String,
    /// `access` or `refresh`
    pub token_type: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Login session shared by an access/refresh pair and the access tokens
    /// refreshed from it; revoking it ends them all
    #[serde(default)]
    pub sid: String,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// User information extracted from authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
    /// `jwt`, or `bypass` in development
    pub auth_source: String,
}

impl UserInfo {
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// User lookup the middleware needs to turn a token into a user
pub type UserLookup = Arc<dyn UserRepositoryTrait + Send + Sync>;

/// Why a presented token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    Expired,
    Invalid,
    UnknownUser,
    Failed,
}

impl AuthRejection {
    /// Message shown to the client
    pub fn message(&self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "缺少认证Token",
            AuthRejection::Expired => "Token已过期",
            AuthRejection::Invalid => "无效的Token",
            AuthRejection::UnknownUser => "用户不存在",
            AuthRejection::Failed => "认证失败",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthRejection::Failed => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let error = if self == AuthRejection::Failed { "internal_error" } else { "unauthorized" };
        auth_error_response(self.status(), error, self.message())
    }
}

/// JSON error body in the same shape the API uses elsewhere
pub fn auth_error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message,
            "details": null
        })),
    )
        .into_response()
}

/// Token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validate an access token and load its user
pub async fn authenticate_token(
    token_str: &str,
    users: &UserLookup,
) -> Result<(Claims, User), AuthRejection> {
    let claims = match token::validate_token_of_type(token_str, token::TokenType::Access) {
        Ok(claims) => claims,
        Err(token::SecurityError::TokenExpired) => return Err(AuthRejection::Expired),
        Err(token::SecurityError::ConfigError(e)) => {
            error!("Token validation misconfigured: {}", e);
            return Err(AuthRejection::Failed);
        }
        Err(e) => {
            debug!("Token rejected: {}", e);
            return Err(AuthRejection::Invalid);
        }
    };

    let user_id = claims.user_id().ok_or(AuthRejection::Invalid)?;
    match users.get_by_id(user_id).await {
        Ok(Some(user)) => Ok((claims, user)),
        Ok(None) => Err(AuthRejection::UnknownUser),
        Err(e) => {
            error!("Failed to load user {}: {}", user_id, e);
            Err(AuthRejection::Failed)
        }
    }
}

/// Authentication middleware for protected routes.
///
/// On success the request carries [`UserInfo`], [`Claims`] and the stored [`User`].
pub async fn auth_middleware(
    State(users): State<UserLookup>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let request_path = req.uri().path().to_string();
    let start_time = std::time::Instant::now();

    if cfg!(debug_assertions) && env::var("BYPASS_AUTH").is_ok() {
        if let Some(response) = bypass_authentication(&users, &mut req).await {
            return response;
        }
        return next.run(req).await;
    }

    let Some(token_str) = bearer_token(req.headers()).map(str::to_string) else {
        debug!("Missing or malformed Authorization header");
        let event = AuthEvent::new(AuthEventType::TokenValidation, None, false)
            .with_details("Missing Authorization bearer token")
            .with_resource(request_path)
            .with_duration(start_time.elapsed().as_millis() as u64)
            .with_auth_method("jwt");
        log_auth_event(event);
        return AuthRejection::MissingToken.into_response();
    };

    match authenticate_token(&token_str, &users).await {
        Ok((claims, user)) => {
            let event = AuthEvent::new(AuthEventType::TokenValidation, Some(&claims.sub), true)
                .with_resource(request_path)
                .with_duration(start_time.elapsed().as_millis() as u64)
                .with_auth_method("jwt");
            log_auth_event(event);

            let user_info = UserInfo {
                user_id: user.id,
                username: user.username.clone(),
                roles: claims.roles.clone(),
                auth_source: "jwt".to_string(),
            };
            req.extensions_mut().insert(user_info);
            req.extensions_mut().insert(claims);
            req.extensions_mut().insert(user);

            next.run(req).await
        }
        Err(rejection) => {
            warn!("Rejected token on {}: {}", request_path, rejection.message());
            let event = AuthEvent::new(AuthEventType::TokenValidation, None, false)
                .with_details(format!("{:?}", rejection))
                .with_resource(request_path)
                .with_duration(start_time.elapsed().as_millis() as u64)
                .with_auth_method("jwt");
            log_auth_event(event);
            rejection.into_response()
        }
    }
}

/// Development-only bypass: `BYPASS_AUTH=<user id>` acts as that user
async fn bypass_authentication(users: &UserLookup, req: &mut Request<Body>) -> Option<Response> {
    let user_id = env::var("BYPASS_AUTH").ok()?.parse::<i64>().unwrap_or(1);
    debug!("Auth bypass enabled in development mode for user {}", user_id);

    match users.get_by_id(user_id).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(UserInfo {
                user_id: user.id,
                username: user.username.clone(),
                roles: vec!["user".to_string(), authorize::ADMIN_ROLE.to_string()],
                auth_source: "bypass".to_string(),
            });
            req.extensions_mut().insert(user);
            None
        }
        _ => Some(AuthRejection::UnknownUser.into_response()),
    }
}

/// Roles granted at token issue: `admin` for usernames listed in `ADMIN_USERNAMES`
pub fn roles_for(username: &str) -> Vec<String> {
    let mut roles = vec!["user".to_string()];
    let is_admin = env::var("ADMIN_USERNAMES")
        .map(|list| list.split(',').any(|name| name.trim() == username))
        .unwrap_or(false);
    if is_admin {
        roles.push(authorize::ADMIN_ROLE.to_string());
    }
    roles
}

/// Install CORS and security headers on the whole application
pub fn configure_auth(app: axum::Router) -> axum::Router {
    use tower_http::cors::{AllowOrigin, Any, CorsLayer};
    use tower_http::set_header::SetResponseHeaderLayer;

    let origins = env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string());
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));
    let cors = if origins.trim() == "*" {
        cors.allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(allowed))
    };

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; img-src 'self' data:; style-src 'self' 'unsafe-inline'; script-src 'self' 'unsafe-inline'; connect-src 'self' ws: wss:; frame-ancestors 'none'",
            ),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    app.layer(cors).layer(security_headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;
    use voice_companion_data::models::NewUser;
    use voice_companion_data::repository::mocks::MockUserRepository;

    async fn whoami(Extension(user): Extension<UserInfo>) -> String {
        format!("{}:{}", user.user_id, user.username)
    }

    async fn setup() -> (Router, UserLookup, User) {
        std::env::set_var("JWT_SECRET", "test_secret_key_for_testing_only");
        std::env::set_var("JWT_ISSUER", "test-issuer");

        let repo = MockUserRepository::new();
        let user = repo
            .create(NewUser {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let users: UserLookup = Arc::new(repo);

        let app = Router::new()
            .route("/me", get(whoami))
            .layer(middleware::from_fn_with_state(users.clone(), auth_middleware));
        (app, users, user)
    }

    async fn message_of(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (app, _, _) = setup().await;
        let response = app
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message_of(response).await, "缺少认证Token");
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let (app, _, user) = setup().await;
        let token = token::generate_token(user.id, &user.username, token::TokenType::Access, None).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], format!("{}:alice", user.id).as_bytes());
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let (app, _, _) = setup().await;
        let token = token::generate_token(999, "ghost", token::TokenType::Access, None).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message_of(response).await, "用户不存在");
    }

    #[tokio::test]
    async fn test_garbage_and_refresh_tokens_are_invalid() {
        let (_, users, user) = setup().await;
        assert_eq!(
            authenticate_token("garbage", &users).await.unwrap_err(),
            AuthRejection::Invalid
        );

        let refresh = token::generate_token(user.id, &user.username, token::TokenType::Refresh, None).unwrap();
        assert_eq!(
            authenticate_token(&refresh, &users).await.unwrap_err(),
            AuthRejection::Invalid
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
