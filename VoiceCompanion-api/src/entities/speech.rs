use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use voice_companion_domain::entities::SpeechPreferences;
use voice_companion_domain::services::voice_styles::VoiceStyleSummary;
use voice_companion_domain::services::Emotion;

/// Base64 encoded audio for `POST /speech/stt`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SttRequest {
    #[validate(length(min = 1, message = "Audio is required"))]
    pub audio: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SttResponse {
    pub text: String,
    pub lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TtsRequest {
    #[validate(length(min = 1, max = 5000, message = "Text must be 1 to 5000 characters"))]
    pub text: String,
    /// Detected from the text when absent
    pub lang: Option<String>,
    /// One of 开心 悲伤 愤怒 焦虑 平静 中性 (default 中性)
    pub emotion: Option<String>,
    pub voice_style: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TtsResponse {
    /// Base64 encoded audio
    pub audio: String,
    pub lang: String,
    pub emotion: String,
    pub voice_style: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmotionEntry {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<Emotion> for EmotionEntry {
    fn from(emotion: Emotion) -> Self {
        Self {
            id: emotion.label().to_string(),
            name: emotion.label().to_string(),
            description: emotion.description().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmotionsResponse {
    pub emotions: Vec<EmotionEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoiceStylesResponse {
    pub voice_styles: Vec<VoiceStyleSummary>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct PreviewQuery {
    /// Language code (default: zh)
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StyleLanguagesResponse {
    pub voice_style: String,
    pub supported_languages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SpeechPreferencesUpdated {
    pub message: String,
    pub preferences: SpeechPreferences,
}

impl From<SpeechPreferences> for SpeechPreferencesUpdated {
    fn from(preferences: SpeechPreferences) -> Self {
        Self {
            message: "偏好设置更新成功".to_string(),
            preferences,
        }
    }
}
