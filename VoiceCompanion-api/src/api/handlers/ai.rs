use axum::{
    extract::{Json, Path, Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use tracing::{info, instrument, warn};
use validator::Validate;

use voice_companion_data::models::User;
use voice_companion_domain::auth::UserInfo;
use voice_companion_domain::services::dashboard::{effective_age, personalized_advice};
use voice_companion_domain::services::sessions::{HistoryMessage, SessionInfo, SessionStatistics};
use voice_companion_domain::services::{flatten_validation_errors, Services, TextReply};

use crate::entities::ai::{
    ActiveSession, ActiveSessionsResponse, AdviceResponse, AiRequest, CreateSessionRequest, CreateSessionResponse,
    HistoryQuery, SessionHistoryResponse, LANGUAGE_PENDING,
};
use crate::entities::{ErrorResponse, MessageResponse};

/// Answer a typed message in a fresh session
#[utoipa::path(
    post,
    path = "/ai/response",
    request_body = AiRequest,
    responses(
        (status = 200, description = "Assistant reply", body = TextReply),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn ai_response(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<AiRequest>,
) -> Result<impl IntoResponse, Response> {
    if let Err(errors) = request.validate() {
        let message = flatten_validation_errors(&errors);
        warn!("Invalid AI request: {}", message);
        return Err(ErrorResponse::validation_error(&message, None).into_response());
    }

    let reply = services.pipeline.text_reply(user.user_id, &request.input).await;
    info!(intent_id = reply.intent_id, session_id = ?reply.session_id, "Answered typed message");
    Ok(Json(reply))
}

#[utoipa::path(
    get,
    path = "/ai/personalized-advice",
    responses(
        (status = 200, description = "Advice for the user's age", body = AdviceResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_personalized_advice(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(AdviceResponse {
        advice: personalized_advice(effective_age(&user)),
    })
}

#[utoipa::path(
    post,
    path = "/ai/session/create",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session opened", body = CreateSessionResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn create_session(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, Response> {
    let session_id = services
        .sessions
        .create_session(user.user_id, request.voice_style.as_deref())
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;

    Ok(Json(CreateSessionResponse {
        session_id,
        user_id: user.user_id,
        voice_style: request.voice_style,
        language: LANGUAGE_PENDING.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/ai/session/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session", body = SessionInfo),
        (status = 404, description = "Unknown, closed or foreign session", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_session(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, Response> {
    let session = services
        .sessions
        .get_owned_session(&session_id, user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(SessionInfo::from(session)))
}

#[utoipa::path(
    get,
    path = "/ai/session/{session_id}/history",
    params(
        ("session_id" = String, Path, description = "Session id"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Latest messages, oldest first", body = SessionHistoryResponse),
        (status = 404, description = "Unknown, closed or foreign session", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_session_history(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, Response> {
    services
        .sessions
        .get_owned_session(&session_id, user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;

    let messages = services
        .sessions
        .get_conversation_history(&session_id, query.limit())
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;

    Ok(Json(SessionHistoryResponse {
        session_id,
        messages: messages.into_iter().map(HistoryMessage::from).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/ai/session/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session closed", body = MessageResponse),
        (status = 404, description = "Unknown, closed or foreign session", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn close_session(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, Response> {
    services
        .sessions
        .get_owned_session(&session_id, user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;

    let closed = services
        .sessions
        .close_session(&session_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    if !closed {
        return Err(ErrorResponse::internal_error_with("关闭会话失败").into_response());
    }
    Ok(Json(MessageResponse::new("会话已关闭")))
}

#[utoipa::path(
    get,
    path = "/ai/session/{session_id}/statistics",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session statistics", body = SessionStatistics),
        (status = 404, description = "Unknown, closed or foreign session", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_session_statistics(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, Response> {
    let session = services
        .sessions
        .get_owned_session(&session_id, user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    let statistics = services
        .sessions
        .get_session_statistics(&session)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(statistics))
}

/// Active sessions of the current user, most recently used first
#[utoipa::path(
    get,
    path = "/ai/sessions/active",
    responses(
        (status = 200, description = "Active sessions", body = ActiveSessionsResponse),
    ),
    security(("bearer" = [])),
    tag = "ai"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_active_sessions(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, Response> {
    let sessions = services
        .sessions
        .get_user_active_sessions(user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(ActiveSessionsResponse {
        user_id: user.user_id,
        sessions: sessions.into_iter().map(ActiveSession::from).collect(),
    }))
}
