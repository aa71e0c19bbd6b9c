use axum::{
    extract::{Json, Path, Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info, instrument, warn};
use validator::Validate;

use voice_companion_domain::auth::UserInfo;
use voice_companion_domain::entities::SpeechPreferences;
use voice_companion_domain::services::voice_styles;
use voice_companion_domain::services::{flatten_validation_errors, Emotion, Services};

use crate::entities::speech::{
    EmotionEntry, EmotionsResponse, PreviewQuery, SpeechPreferencesUpdated, StyleLanguagesResponse, SttRequest,
    SttResponse, TtsRequest, TtsResponse, VoiceStylesResponse,
};
use crate::entities::ErrorResponse;

const VOICE_STYLE_NOT_FOUND: &str = "音色风格不存在";

fn validate(request: &impl Validate) -> Result<(), Response> {
    request
        .validate()
        .map_err(|errors| ErrorResponse::validation_error(&flatten_validation_errors(&errors), None).into_response())
}

/// Transcribe base64 audio
#[utoipa::path(
    post,
    path = "/speech/stt",
    request_body = SttRequest,
    responses(
        (status = 200, description = "Transcription", body = SttResponse),
        (status = 400, description = "Audio is not valid base64", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn speech_to_text(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<SttRequest>,
) -> Result<impl IntoResponse, Response> {
    validate(&request)?;
    let audio = STANDARD.decode(request.audio.trim()).map_err(|e| {
        warn!("Rejected STT audio: {}", e);
        ErrorResponse::bad_request("音频数据不是有效的Base64").into_response()
    })?;

    let transcription = services.stt.transcribe(audio, None).await;
    info!(succ = transcription.succ, method = %transcription.method, "Speech to text");
    Ok(Json(SttResponse {
        text: transcription.text,
        lang: transcription.lang,
    }))
}

/// Synthesize speech with an emotion and voice style
#[utoipa::path(
    post,
    path = "/speech/tts",
    request_body = TtsRequest,
    responses(
        (status = 200, description = "Base64 audio", body = TtsResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument(skip(services, user, request), fields(user_id = user.user_id))]
pub async fn text_to_speech(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<TtsRequest>,
) -> Result<impl IntoResponse, Response> {
    validate(&request)?;

    let lang = match request.lang.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(lang) => lang.to_string(),
        None => services.translation.detect_language(&request.text).await,
    };
    let emotion = match request.emotion.as_deref() {
        Some(label) => Emotion::from_label(label).unwrap_or_else(|| {
            warn!("Unknown emotion {}, speaking neutrally", label);
            Emotion::Neutral
        }),
        None => Emotion::Neutral,
    };

    let (audio, method) = services
        .tts
        .synthesize(&request.text, &lang, emotion, request.voice_style.as_deref())
        .await;
    info!(%lang, emotion = emotion.label(), method, bytes = audio.len(), "Text to speech");

    Ok(Json(TtsResponse {
        audio: STANDARD.encode(audio),
        lang,
        emotion: emotion.label().to_string(),
        voice_style: request.voice_style,
    }))
}

/// The six emotions TTS can express
#[utoipa::path(
    get,
    path = "/speech/emotions",
    responses((status = 200, description = "Emotion labels", body = EmotionsResponse)),
    tag = "speech"
)]
#[instrument]
pub async fn get_emotions() -> impl IntoResponse {
    Json(EmotionsResponse {
        emotions: Emotion::ALL.into_iter().map(EmotionEntry::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/speech/voice-styles",
    responses((status = 200, description = "Voice styles", body = VoiceStylesResponse)),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument]
pub async fn get_voice_styles() -> impl IntoResponse {
    Json(VoiceStylesResponse {
        voice_styles: voice_styles::list_voice_styles(),
    })
}

#[utoipa::path(
    get,
    path = "/speech/voice-styles/{voice_style_id}",
    params(("voice_style_id" = String, Path, description = "Voice style id")),
    responses(
        (status = 200, description = "Voice style with its voice per language", body = voice_styles::VoiceStyleInfo),
        (status = 404, description = "Unknown voice style", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument]
pub async fn get_voice_style(Path(voice_style_id): Path<String>) -> Result<impl IntoResponse, Response> {
    voice_styles::voice_style_info(&voice_style_id)
        .map(Json)
        .ok_or_else(|| ErrorResponse::not_found(VOICE_STYLE_NOT_FOUND).into_response())
}

/// Voice a style would use for a language
#[utoipa::path(
    get,
    path = "/speech/voice-styles/{voice_style_id}/preview",
    params(
        ("voice_style_id" = String, Path, description = "Voice style id"),
        PreviewQuery
    ),
    responses((status = 200, description = "Preview", body = voice_styles::VoicePreview)),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument]
pub async fn get_voice_style_preview(
    Path(voice_style_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> impl IntoResponse {
    let language = query.language.unwrap_or_else(|| "zh".to_string());
    Json(voice_styles::preview(&voice_style_id, &language))
}

#[utoipa::path(
    get,
    path = "/speech/voice-styles/{voice_style_id}/languages",
    params(("voice_style_id" = String, Path, description = "Voice style id")),
    responses(
        (status = 200, description = "Languages the style speaks", body = StyleLanguagesResponse),
        (status = 404, description = "Unknown voice style", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument]
pub async fn get_voice_style_languages(Path(voice_style_id): Path<String>) -> Result<impl IntoResponse, Response> {
    let supported_languages = voice_styles::style_languages(&voice_style_id)
        .ok_or_else(|| ErrorResponse::not_found(VOICE_STYLE_NOT_FOUND).into_response())?;
    Ok(Json(StyleLanguagesResponse {
        voice_style: voice_style_id,
        supported_languages,
    }))
}

#[utoipa::path(
    get,
    path = "/speech/preferences",
    responses((status = 200, description = "Speech settings", body = SpeechPreferences)),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument(skip(services, user), fields(user_id = user.user_id))]
pub async fn get_speech_preferences(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, Response> {
    let preferences = services
        .users
        .get_speech_preferences(user.user_id)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(preferences))
}

/// Store speech settings under the `voice` preference key
#[utoipa::path(
    put,
    path = "/speech/preferences",
    request_body = SpeechPreferences,
    responses((status = 200, description = "Stored settings", body = SpeechPreferencesUpdated)),
    security(("bearer" = [])),
    tag = "speech"
)]
#[instrument(skip(services, user, preferences), fields(user_id = user.user_id))]
pub async fn update_speech_preferences(
    State(services): State<Services>,
    Extension(user): Extension<UserInfo>,
    Json(preferences): Json<SpeechPreferences>,
) -> Result<impl IntoResponse, Response> {
    let stored = services
        .users
        .update_speech_preferences(user.user_id, preferences)
        .await
        .map_err(|e| ErrorResponse::from(e).into_response())?;
    Ok(Json(SpeechPreferencesUpdated::from(stored)))
}
