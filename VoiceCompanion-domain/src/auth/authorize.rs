use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth::logging::{log_access_denied, log_auth_event, AuthEvent, AuthEventType};
use crate::auth::{auth_error_response, UserInfo};

/// Role required for the operator endpoints
pub const ADMIN_ROLE: &str = "admin";

/// Let the request through only when the authenticated user holds one of `required_roles`.
///
/// Must run after `auth_middleware`, which puts [`UserInfo`] into the request extensions.
pub async fn require_roles(req: Request<Body>, next: Next, required_roles: &[&str]) -> Response {
    let request_path = req.uri().path().to_string();
    let required: Vec<String> = required_roles.iter().map(|r| r.to_string()).collect();

    let Some(user) = req.extensions().get::<UserInfo>().cloned() else {
        warn!("No user info found in request extensions for path: {}", request_path);

        let event = AuthEvent::new(AuthEventType::AccessDenied, None, false)
            .with_details("Authentication context missing in request extensions")
            .with_resource(request_path)
            .with_auth_method("rbac");
        log_auth_event(event);

        return auth_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Authentication context missing",
        );
    };

    if user.has_any_role(&required) {
        debug!("User {} has required role for resource access: {}", user.user_id, request_path);
        return next.run(req).await;
    }

    warn!(
        "User {} lacks required roles: {:?} for resource: {}",
        user.user_id, required, request_path
    );
    log_access_denied(&user.user_id.to_string(), &request_path, &required);

    auth_error_response(
        StatusCode::FORBIDDEN,
        "forbidden",
        "You don't have the required permissions to access this resource",
    )
}

/// Middleware for the admin router
pub async fn require_admin(req: Request<Body>, next: Next) -> Response {
    require_roles(req, next, &[ADMIN_ROLE]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn user_with_roles(roles: &[&str]) -> UserInfo {
        UserInfo {
            user_id: 1,
            username: "tester".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            auth_source: "test".to_string(),
        }
    }

    fn app(user: Option<UserInfo>) -> Router {
        let router = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_admin));
        match user {
            Some(user) => router.layer(Extension(user)),
            None => router,
        }
    }

    // Extension layers above from_fn run first, so the user is visible to the guard.
    #[tokio::test]
    async fn test_admin_role_passes() {
        let response = app(Some(user_with_roles(&["user", "admin"])))
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_role_is_forbidden() {
        let response = app(Some(user_with_roles(&["user"])))
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_context_is_server_error() {
        let response = app(None)
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
