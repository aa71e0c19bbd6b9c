//! OpenAI client: chat completions, Whisper transcription and `tts-1` speech

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    build_http_client, check_status, ChatMessage, ChatModel, ChatRequest, ProviderError, ProviderSettings,
    SpeechRecognizer, SpeechSynthesizer, SynthesisRequest,
};

/// Client for the OpenAI REST API; cheap to clone
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// `None` when no API key is configured
    pub fn from_settings(settings: &ProviderSettings) -> Option<Self> {
        let key = settings.openai_api_key.clone()?;
        Self::new(settings.openai_base_url.clone(), key, settings.timeout_secs).ok()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: String,
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            max_completion_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        debug!(model = %request.model, messages = request.messages.len(), "sending chat completion");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let parsed: ChatCompletionResponse = check_status("openai", response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty or missing content in response".to_string()))
    }
}

#[async_trait]
impl SpeechRecognizer for OpenAiClient {
    async fn recognize(&self, wav: Vec<u8>, language: Option<String>) -> Result<String, ProviderError> {
        let file = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", "whisper-1")
            .text("response_format", "json");
        if let Some(language) = language {
            // Whisper takes ISO-639-1, not a locale
            let short = language.split('-').next().unwrap_or_default().to_string();
            form = form.text("language", short);
        }

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let parsed: TranscriptionResponse = check_status("openai", response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
        let payload = SpeechRequest {
            model: "tts-1",
            voice: &request.voice,
            input: rate_markup(&request.text, request.rate),
        };

        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let bytes = check_status("openai", response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::InvalidResponse("empty audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

/// Wrap text in a rate hint when the emotion changes the speaking rate
pub(crate) fn rate_markup(text: &str, rate: f64) -> String {
    if (rate - 1.0).abs() < f64::EPSILON {
        text.to_string()
    } else {
        format!("<speak rate=\"{}\">{}</speak>", rate, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_markup() {
        assert_eq!(rate_markup("你好", 1.0), "你好");
        assert_eq!(rate_markup("你好", 1.2), "<speak rate=\"1.2\">你好</speak>");
    }

    #[test]
    fn test_missing_key_disables_client() {
        let settings = ProviderSettings::default();
        assert!(OpenAiClient::from_settings(&settings).is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiClient::new("http://localhost:9999/v1/", "k", 5).unwrap();
        assert_eq!(client.url("chat/completions"), "http://localhost:9999/v1/chat/completions");
    }
}
