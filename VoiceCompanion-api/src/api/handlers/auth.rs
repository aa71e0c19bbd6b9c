use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use voice_companion_domain::auth::{Claims, UserInfo};
use voice_companion_domain::entities::{
    ChangePasswordRequest, LoginRequest, ProfileUpdateRequest, RefreshTokenRequest, RegisterRequest, UserProfile,
};
use voice_companion_domain::services::Services;

use crate::entities::auth::{LoginResponse, PreferencesResponse, RefreshResponse, RegisterResponse};
use crate::entities::{ErrorResponse, MessageResponse};

/// Register a new account and sign it in
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid request or username taken", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(services, request), fields(username = %request.username))]
pub async fn register(
    State(services): State<Services>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, Response> {
    let session = services
        .users
        .register(request)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    info!(user_id = session.user.id, "Registered user");
    Ok((StatusCode::OK, Json(RegisterResponse::from(session))))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Bad credentials", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(services, request), fields(username = %request.username))]
pub async fn login(
    State(services): State<Services>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, Response> {
    let session = services
        .users
        .login(request)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(LoginResponse::from(session)))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Refresh token rejected", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip(services, request))]
pub async fn refresh(
    State(services): State<Services>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, Response> {
    let (token, expires_in) = services
        .users
        .refresh(&request.refresh_token)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(RefreshResponse {
        token,
        token_type: "bearer".to_string(),
        expires_in,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_profile(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, Response> {
    let profile = services
        .users
        .get_profile(user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(profile))
}

#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn update_profile(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, Response> {
    let profile = services
        .users
        .update_profile(user.user_id, request)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(profile))
}

#[utoipa::path(
    put,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Old password wrong", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn change_password(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, Response> {
    services
        .users
        .change_password(user.user_id, request)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(MessageResponse::new("密码修改成功")))
}

/// Revoke the token used for this request
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(services, user, claims), fields(user_id = user.user_id))]
pub async fn logout(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    claims: Option<Extension<Claims>>,
) -> Result<impl IntoResponse, Response> {
    // Bypassed requests carry no token to revoke
    if let Some(Extension(claims)) = claims {
        services
            .users
            .logout(&claims)
            .map_err(|e| ErrorResponse::from(e).into_response())?;
    }
    Ok(Json(MessageResponse::new("登出成功")))
}

#[utoipa::path(
    get,
    path = "/auth/preferences",
    responses(
        (status = 200, description = "Stored preferences", body = PreferencesResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_preferences(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, Response> {
    let preferences = services
        .users
        .get_preferences(user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(PreferencesResponse { preferences }))
}

/// Replace the stored preferences with the given object
#[utoipa::path(
    put,
    path = "/auth/preferences",
    request_body = Object,
    responses(
        (status = 200, description = "Stored preferences", body = PreferencesResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(services, user, preferences), fields(user_id = user.user_id))]
pub async fn update_preferences(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(preferences): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, Response> {
    let preferences = services
        .users
        .update_preferences(user.user_id, preferences)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(PreferencesResponse { preferences }))
}
