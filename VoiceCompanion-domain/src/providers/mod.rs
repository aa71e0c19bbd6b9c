//! HTTP clients for the cloud AI providers
//!
//! Every provider sits behind a small trait so the services can chain them
//! and tests can substitute mocks. Wire types stay private to each client.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[cfg(test)]
use mockall::automock;

pub mod azure;
pub mod deepl;
pub mod openai;

pub use azure::{AzureSpeechClient, AzureTextAnalyticsClient};
pub use deepl::DeepLClient;
pub use openai::OpenAiClient;

/// Error type shared by the provider clients
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has no credentials configured
    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),

    /// Transport failure or timeout
    #[error("Request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response could not be understood
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Request(error.to_string())
    }
}

/// Provider credentials and endpoints, all from the environment
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub azure_speech_key: Option<String>,
    pub tts_region: String,
    pub stt_region: String,
    pub azure_emotion_key: Option<String>,
    pub azure_emotion_endpoint: Option<String>,
    pub deepl_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            azure_speech_key: None,
            tts_region: "eastus".to_string(),
            stt_region: "eastus".to_string(),
            azure_emotion_key: None,
            azure_emotion_endpoint: None,
            deepl_api_key: None,
            timeout_secs: 30,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: non_empty_var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            azure_speech_key: non_empty_var("AZURE_SPEECH_KEY"),
            tts_region: non_empty_var("DEFAULT_TTS_REGION").unwrap_or(defaults.tts_region),
            stt_region: non_empty_var("DEFAULT_STT_REGION").unwrap_or(defaults.stt_region),
            azure_emotion_key: non_empty_var("AZURE_EMOTION_KEY"),
            azure_emotion_endpoint: non_empty_var("AZURE_EMOTION_ENDPOINT"),
            deepl_api_key: non_empty_var("DEEPL_API_KEY"),
            timeout_secs: non_empty_var("PROVIDER_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Shared HTTP client with a request timeout
pub fn build_http_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))
}

/// Return the response when successful, or its status and body as an error
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    error!(%status, provider, %message, "provider request returned HTTP error");
    Err(ProviderError::Status {
        status: status.as_u16(),
        message,
    })
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// A single chat completion round trip
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: &str, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages,
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Chat-completion model
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Text of the first choice, trimmed
    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError>;
}

/// Speech recognizer over a complete WAV recording
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognized text; `language` is a full locale such as `zh-CN` when given
    async fn recognize(&self, wav: Vec<u8>, language: Option<String>) -> Result<String, ProviderError>;
}

/// What to speak and how
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Provider voice name, e.g. `zh-CN-XiaoxiaoNeural` or `alloy`
    pub voice: String,
    /// Speaking style such as `cheerful`; `neutral` means none
    pub style: String,
    pub rate: f64,
}

/// Text-to-speech engine producing encoded audio
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, ProviderError>;
}

/// Document-level sentiment classifier
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// `positive`, `neutral`, `negative` or `mixed`
    async fn sentiment(&self, text: String, language: String) -> Result<String, ProviderError>;
}

/// Machine translation engine
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TextTranslator: Send + Sync {
    /// Language codes are the short two-letter codes (`zh`, `en`, ...)
    async fn translate(&self, text: String, source: String, target: String) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(settings.tts_region, "eastus");
        assert_eq!(settings.timeout_secs, 30);
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_chat_request_builder() {
        let request = ChatRequest::new("gpt-4o", vec![ChatMessage::user("hi")], 1000).with_temperature(0.2);
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.temperature, Some(0.2));
    }
}
