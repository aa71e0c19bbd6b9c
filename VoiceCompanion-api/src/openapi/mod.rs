use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

/// Registers the `bearer` scheme referenced by protected paths
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // System
        crate::api::handlers::system::root,
        crate::api::handlers::system::ping,
        crate::api::handlers::system::health_check,

        // Auth
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::refresh,
        crate::api::handlers::auth::get_profile,
        crate::api::handlers::auth::update_profile,
        crate::api::handlers::auth::change_password,
        crate::api::handlers::auth::logout,
        crate::api::handlers::auth::get_preferences,
        crate::api::handlers::auth::update_preferences,

        // AI
        crate::api::handlers::ai::ai_response,
        crate::api::handlers::ai::get_personalized_advice,
        crate::api::handlers::ai::create_session,
        crate::api::handlers::ai::get_session,
        crate::api::handlers::ai::get_session_history,
        crate::api::handlers::ai::close_session,
        crate::api::handlers::ai::get_session_statistics,
        crate::api::handlers::ai::get_active_sessions,

        // Speech
        crate::api::handlers::speech::speech_to_text,
        crate::api::handlers::speech::text_to_speech,
        crate::api::handlers::speech::get_emotions,
        crate::api::handlers::speech::get_voice_styles,
        crate::api::handlers::speech::get_voice_style,
        crate::api::handlers::speech::get_voice_style_preview,
        crate::api::handlers::speech::get_voice_style_languages,
        crate::api::handlers::speech::get_speech_preferences,
        crate::api::handlers::speech::update_speech_preferences,

        // Navigation
        crate::api::handlers::navigation::get_pages,
        crate::api::handlers::navigation::get_page_by_route,
        crate::api::handlers::navigation::detect_navigation,
        crate::api::handlers::navigation::reload_navigation,

        // Dashboard, health data, devices
        crate::api::handlers::dashboard::get_steps,
        crate::api::handlers::dashboard::get_weather,
        crate::api::handlers::dashboard::get_sleep,
        crate::api::handlers::dashboard::get_body_metrics,
        crate::api::handlers::dashboard::get_recipe,
        crate::api::handlers::health_data::get_health_data,
        crate::api::handlers::health_data::upload_health_data,
        crate::api::handlers::health_data::get_health_stats,
        crate::api::handlers::device::connect_device,

        // Admin
        crate::api::handlers::admin::get_config_status,
        crate::api::handlers::admin::reload_configs,
        crate::api::handlers::admin::validate_config,
        crate::api::handlers::admin::get_interaction_statistics
    ),
    components(
        schemas(
            crate::entities::common::ErrorResponse,
            crate::entities::common::MessageResponse,
            crate::entities::system::RootResponse,
            crate::entities::system::PingResponse,
            crate::entities::system::HealthResponse,
            crate::entities::system::ComponentHealthStatus,
            crate::entities::auth::RegisterResponse,
            crate::entities::auth::LoginResponse,
            crate::entities::auth::RefreshResponse,
            crate::entities::auth::PreferencesResponse,
            crate::entities::ai::AiRequest,
            crate::entities::ai::AdviceResponse,
            crate::entities::ai::CreateSessionRequest,
            crate::entities::ai::CreateSessionResponse,
            crate::entities::ai::SessionHistoryResponse,
            crate::entities::ai::ActiveSession,
            crate::entities::ai::ActiveSessionsResponse,
            crate::entities::speech::SttRequest,
            crate::entities::speech::SttResponse,
            crate::entities::speech::TtsRequest,
            crate::entities::speech::TtsResponse,
            crate::entities::speech::EmotionEntry,
            crate::entities::speech::EmotionsResponse,
            crate::entities::speech::VoiceStylesResponse,
            crate::entities::speech::StyleLanguagesResponse,
            crate::entities::speech::SpeechPreferencesUpdated,
            crate::entities::navigation::DetectNavigationRequest,
            crate::entities::health_data::UploadResponse,
            crate::entities::device::DeviceConnectRequest,
            crate::entities::device::DeviceConnectResponse,
            crate::entities::admin::ConfigStatusResponse,
            crate::entities::admin::ConfigReloadResponse,

            voice_companion_domain::auth::Claims,
            voice_companion_domain::auth::UserInfo,
            voice_companion_domain::entities::RegisterRequest,
            voice_companion_domain::entities::LoginRequest,
            voice_companion_domain::entities::RefreshTokenRequest,
            voice_companion_domain::entities::ProfileUpdateRequest,
            voice_companion_domain::entities::ChangePasswordRequest,
            voice_companion_domain::entities::UserProfile,
            voice_companion_domain::entities::SpeechPreferences,
            voice_companion_domain::entities::UploadHealthDataRequest,
            voice_companion_domain::entities::HealthRecord,
            voice_companion_domain::entities::HealthStats,
            voice_companion_domain::services::TextReply,
            voice_companion_domain::services::NavigationResult,
            voice_companion_domain::services::navigation::PageInfo,
            voice_companion_domain::services::sessions::SessionInfo,
            voice_companion_domain::services::sessions::HistoryMessage,
            voice_companion_domain::services::sessions::LanguageDistribution,
            voice_companion_domain::services::sessions::SessionStatistics,
            voice_companion_domain::services::voice_styles::VoiceStyleSummary,
            voice_companion_domain::services::voice_styles::VoiceStyleInfo,
            voice_companion_domain::services::voice_styles::VoicePreview,
            voice_companion_domain::services::dashboard::StepsCard,
            voice_companion_domain::services::dashboard::WeatherCard,
            voice_companion_domain::services::dashboard::SleepCard,
            voice_companion_domain::services::dashboard::BodyMetricsCard,
            voice_companion_domain::services::dashboard::RecipeCard
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "system", description = "Service banner, liveness and component health"),
        (name = "auth", description = "Registration, tokens, profile and preferences"),
        (name = "ai", description = "Typed replies and conversation sessions"),
        (name = "speech", description = "Speech recognition, synthesis and voice styles"),
        (name = "navigation", description = "Voice navigation between app pages"),
        (name = "dashboard", description = "Home screen cards"),
        (name = "health-data", description = "Wearable data uploads and weekly statistics"),
        (name = "device", description = "Wearable pairing"),
        (name = "admin", description = "Configuration tables and interaction analytics")
    ),
    info(
        title = "VoiceCompanion API",
        version = "0.1.0",
        description = "Voice assistant backend: chat, speech, emotion, translation and navigation",
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
