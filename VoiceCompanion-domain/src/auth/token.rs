use std::env;
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::token_blacklist;
use crate::auth::Claims;

/// Security errors for authentication and token operations
#[derive(Debug, Error)]
pub enum SecurityError {
    /// JWT validation error
    #[error("Token validation error: {0}")]
    TokenValidation(String),

    /// Expired token
    #[error("Token has expired")]
    TokenExpired,

    /// Token not yet valid
    #[error("Token is not yet valid")]
    TokenNotYetValid,

    /// Invalid token structure
    #[error("Invalid token format")]
    InvalidToken,

    /// Configuration error
    #[error("Security configuration error: {0}")]
    ConfigError(String),

    /// Token has been revoked
    #[error("Token has been revoked")]
    TokenRevoked,

    /// A refresh token was presented where an access token is required, or the reverse
    #[error("Unexpected token type: expected {expected}, got {actual}")]
    WrongTokenType { expected: String, actual: String },

    /// Password hashing failed
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// Token types for authentication
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenType {
    /// Access token sent on every request
    Access,
    /// Long-lived refresh token
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    /// Get the expiration duration for this token type
    pub fn expiration(&self) -> Duration {
        match self {
            TokenType::Access => {
                let expiration_minutes = env::var("ACCESS_TOKEN_EXPIRATION_MINUTES")
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(10080);

                Duration::minutes(expiration_minutes)
            }
            TokenType::Refresh => {
                let expiration_days = env::var("REFRESH_TOKEN_EXPIRATION_DAYS")
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(30);

                Duration::days(expiration_days)
            }
        }
    }
}

/// Signing secret: `JWT_SECRET`, then `SECRET_KEY`
fn jwt_secret() -> Result<String, SecurityError> {
    env::var("JWT_SECRET")
        .or_else(|_| env::var("SECRET_KEY"))
        .map_err(|_| {
            error!("Neither JWT_SECRET nor SECRET_KEY is set");
            SecurityError::ConfigError("JWT_SECRET environment variable not found".to_string())
        })
}

fn jwt_issuer() -> String {
    env::var("JWT_ISSUER").unwrap_or_else(|_| "voice-companion-api".to_string())
}

/// Generate a new JWT token for a user in a login session of its own
pub fn generate_token(
    user_id: i64,
    username: &str,
    token_type: TokenType,
    roles: Option<Vec<String>>,
) -> Result<String, SecurityError> {
    generate_session_token(user_id, username, token_type, roles, &Uuid::new_v4().to_string())
}

/// Generate a token that belongs to the login session `session_id`
pub fn generate_session_token(
    user_id: i64,
    username: &str,
    token_type: TokenType,
    roles: Option<Vec<String>>,
    session_id: &str,
) -> Result<String, SecurityError> {
    let jwt_secret = jwt_secret()?;

    let now = Utc::now();
    let expiration = now + token_type.expiration();

    let claims = Claims {
        sub: user_id.to_string(),
        name: username.to_string(),
        iss: jwt_issuer(),
        iat: now.timestamp(),
        exp: expiration.timestamp(),
        jti: Uuid::new_v4().to_string(),
        token_type: token_type.as_str().to_string(),
        roles: roles.unwrap_or_else(|| vec!["user".to_string()]),
        sid: session_id.to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Failed to encode JWT token: {}", e);
        SecurityError::TokenValidation(e.to_string())
    })?;

    // Never log the token itself
    info!("Generated {:?} token for user {}", token_type, user_id);
    debug!("Token expiration: {}", expiration);

    Ok(token)
}

/// Validate a JWT token and return the decoded claims
pub fn validate_token(token: &str) -> Result<Claims, SecurityError> {
    let jwt_secret = jwt_secret()?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.set_issuer(&[jwt_issuer()]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::ImmatureSignature => SecurityError::TokenNotYetValid,
        jsonwebtoken::errors::ErrorKind::InvalidToken => SecurityError::InvalidToken,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => SecurityError::InvalidIssuer,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            SecurityError::TokenValidation("Invalid signature".to_string())
        }
        _ => SecurityError::TokenValidation(e.to_string()),
    })?;

    let claims = &token_data.claims;
    if is_token_revoked(&claims.jti) || (!claims.sid.is_empty() && is_token_revoked(&claims.sid)) {
        return Err(SecurityError::TokenRevoked);
    }

    Ok(token_data.claims)
}

/// Validate a token and require a specific token type
pub fn validate_token_of_type(token: &str, expected: TokenType) -> Result<Claims, SecurityError> {
    let claims = validate_token(token)?;
    if claims.token_type != expected.as_str() {
        return Err(SecurityError::WrongTokenType {
            expected: expected.as_str().to_string(),
            actual: claims.token_type,
        });
    }
    Ok(claims)
}

fn is_token_revoked(jti: &str) -> bool {
    let is_revoked = token_blacklist::blacklist().is_revoked(jti);
    debug!("Checking if token {} is revoked: {}", jti, is_revoked);
    is_revoked
}

/// Revoke a single token until its natural expiry
pub fn revoke_token(claims: &Claims) -> Result<(), SecurityError> {
    info!("Revoking token {} of user {}", claims.jti, claims.sub);

    let expiration = u64::try_from(claims.exp)
        .map(|secs| UNIX_EPOCH + StdDuration::from_secs(secs))
        .unwrap_or_else(|_| SystemTime::now());
    token_blacklist::blacklist().revoke_token(&claims.jti, expiration);

    Ok(())
}

/// Revoke the presented token and every other token of its login session.
/// The session entry outlives the longest token the session can hold.
pub fn revoke_session(claims: &Claims) -> Result<(), SecurityError> {
    revoke_token(claims)?;
    if claims.sid.is_empty() {
        return Ok(());
    }

    info!("Revoking login session {} of user {}", claims.sid, claims.sub);
    let lifetime = TokenType::Refresh
        .expiration()
        .to_std()
        .map_err(|e| SecurityError::ConfigError(e.to_string()))?;
    token_blacklist::blacklist().revoke_token(&claims.sid, SystemTime::now() + lifetime);

    Ok(())
}
