use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use voice_companion_domain::auth::{auth_middleware, authorize, configure_auth, UserLookup};
use voice_companion_domain::services::Services;

use crate::api::handlers::{
    admin, ai, auth, dashboard, device, health_data, navigation, speech, system, voice_chat,
};
use crate::openapi::configure_swagger_routes;

/// Create the application router
pub fn create_app(services: Services) -> Router {
    debug!("Creating application router");
    let users: UserLookup = services.user_repository.clone();

    // Routes reachable without a token
    let public_routes = Router::new()
        .route("/", get(system::root))
        .route("/ping", get(system::ping))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/speech/emotions", get(speech::get_emotions))
        .route("/navigation/pages", get(navigation::get_pages))
        .route("/navigation/pages/:route", get(navigation::get_page_by_route))
        .route("/navigation/detect", post(navigation::detect_navigation))
        // Authenticated through the `token` query parameter
        .route("/ai/voice_chat", get(voice_chat::voice_chat));

    debug!("Public routes configured");

    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/change-password", put(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/preferences", get(auth::get_preferences).put(auth::update_preferences))
        .route("/ai/response", post(ai::ai_response))
        .route("/ai/personalized-advice", get(ai::get_personalized_advice))
        .route("/ai/session/create", post(ai::create_session))
        .route("/ai/sessions/active", get(ai::get_active_sessions))
        .route("/ai/session/:session_id", get(ai::get_session).delete(ai::close_session))
        .route("/ai/session/:session_id/history", get(ai::get_session_history))
        .route("/ai/session/:session_id/statistics", get(ai::get_session_statistics))
        .route("/speech/stt", post(speech::speech_to_text))
        .route("/speech/tts", post(speech::text_to_speech))
        .route("/speech/voice-styles", get(speech::get_voice_styles))
        .route("/speech/voice-styles/:voice_style_id", get(speech::get_voice_style))
        .route("/speech/voice-styles/:voice_style_id/preview", get(speech::get_voice_style_preview))
        .route("/speech/voice-styles/:voice_style_id/languages", get(speech::get_voice_style_languages))
        .route(
            "/speech/preferences",
            get(speech::get_speech_preferences).put(speech::update_speech_preferences),
        )
        .route("/navigation/reload", post(navigation::reload_navigation))
        .route("/dashboard/steps", get(dashboard::get_steps))
        .route("/dashboard/weather", get(dashboard::get_weather))
        .route("/dashboard/sleep", get(dashboard::get_sleep))
        .route("/dashboard/body-metrics", get(dashboard::get_body_metrics))
        .route("/dashboard/recipe", get(dashboard::get_recipe))
        .route("/health/data", get(health_data::get_health_data))
        .route("/health/upload", post(health_data::upload_health_data))
        .route("/health/stats", get(health_data::get_health_stats))
        .route("/device/connect", post(device::connect_device))
        .layer(middleware::from_fn_with_state(users.clone(), auth_middleware));

    debug!("Protected routes configured");

    // Authentication must happen before authorization
    let admin_routes = Router::new()
        .route("/configs/status", get(admin::get_config_status))
        .route("/configs/reload", post(admin::reload_configs))
        .route("/configs/:name/validate", get(admin::validate_config))
        .route("/interactions/statistics", get(admin::get_interaction_statistics))
        .layer(middleware::from_fn(authorize::require_admin))
        .layer(middleware::from_fn_with_state(users, auth_middleware));

    debug!("Admin routes configured");

    let api_v1 = Router::new()
        .route("/health", get(system::health_check))
        .nest("/admin", admin_routes);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/api/v1", api_v1)
        .with_state(services);

    debug!("Routes merged");

    let app = app.merge(configure_swagger_routes());
    let app = configure_auth(app).layer(TraceLayer::new_for_http());
    debug!("Security configuration applied");

    system::initialize_server_start_time();
    app
}
