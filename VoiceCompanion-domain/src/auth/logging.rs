use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Types of authentication events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventType {
    Login,
    Logout,
    TokenRefresh,
    TokenRevocation,
    PasswordChange,
    Registration,
    FailedLogin,
    AccessDenied,
    SessionExpired,
    TokenValidation,
}

impl std::fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuthEventType::Login => "LOGIN",
            AuthEventType::Logout => "LOGOUT",
            AuthEventType::TokenRefresh => "TOKEN_REFRESH",
            AuthEventType::TokenRevocation => "TOKEN_REVOCATION",
            AuthEventType::PasswordChange => "PASSWORD_CHANGE",
            AuthEventType::Registration => "REGISTRATION",
            AuthEventType::FailedLogin => "FAILED_LOGIN",
            AuthEventType::AccessDenied => "ACCESS_DENIED",
            AuthEventType::SessionExpired => "SESSION_EXPIRED",
            AuthEventType::TokenValidation => "TOKEN_VALIDATION",
        };
        f.write_str(label)
    }
}

/// Authentication event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    pub event_type: AuthEventType,
    /// User id or attempted username
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub details: Option<String>,
    /// Path or resource being accessed
    pub resource: Option<String>,
    pub duration_ms: Option<u64>,
    /// `password`, `jwt`, `refresh_token`, `rbac`, `websocket`
    pub auth_method: Option<String>,
}

impl AuthEvent {
    pub fn new(event_type: AuthEventType, user_id: Option<&str>, success: bool) -> Self {
        Self {
            event_type,
            user_id: user_id.map(|s| s.to_string()),
            timestamp: Utc::now(),
            ip_address: None,
            user_agent: None,
            success,
            details: None,
            resource: None,
            duration_ms: None,
            auth_method: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }

    /// The single `AUTH-LOG` line written for this event
    pub fn log_line(&self) -> String {
        format!(
            "AUTH-LOG [{}] [{}] [{}] [{}] {}",
            self.event_type,
            self.user_id.as_deref().unwrap_or("anonymous"),
            self.ip_address.as_deref().unwrap_or("-"),
            if self.success { "SUCCESS" } else { "FAILURE" },
            self.details.as_deref().unwrap_or("")
        )
    }
}

/// Log an authentication event
pub fn log_auth_event(event: AuthEvent) {
    let line = event.log_line();
    if event.success {
        info!(
            resource = event.resource.as_deref().unwrap_or(""),
            method = event.auth_method.as_deref().unwrap_or(""),
            duration_ms = event.duration_ms.unwrap_or(0),
            "{}",
            line
        );
    } else {
        warn!(
            resource = event.resource.as_deref().unwrap_or(""),
            method = event.auth_method.as_deref().unwrap_or(""),
            duration_ms = event.duration_ms.unwrap_or(0),
            "{}",
            line
        );
    }
}

pub fn log_successful_login(user_id: &str) {
    log_auth_event(AuthEvent::new(AuthEventType::Login, Some(user_id), true).with_auth_method("password"));
}

pub fn log_failed_login(username: &str, reason: &str) {
    let event = AuthEvent::new(AuthEventType::FailedLogin, Some(username), false)
        .with_details(reason)
        .with_auth_method("password");
    log_auth_event(event);
}

pub fn log_token_refresh(user_id: &str, success: bool, details: Option<&str>) {
    let mut event = AuthEvent::new(AuthEventType::TokenRefresh, Some(user_id), success)
        .with_auth_method("refresh_token");
    if let Some(d) = details {
        event = event.with_details(d);
    }
    log_auth_event(event);
}

pub fn log_logout(user_id: &str) {
    log_auth_event(AuthEvent::new(AuthEventType::Logout, Some(user_id), true));
}

pub fn log_access_denied(user_id: &str, resource: &str, required_roles: &[String]) {
    let event = AuthEvent::new(AuthEventType::AccessDenied, Some(user_id), false)
        .with_resource(resource)
        .with_details(format!("Required roles: {}", required_roles.join(", ")));
    log_auth_event(event);
}
