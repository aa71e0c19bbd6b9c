//! Azure Cognitive Services: speech REST endpoints and Text Analytics sentiment

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    build_http_client, check_status, ProviderError, ProviderSettings, SentimentAnalyzer, SpeechRecognizer,
    SpeechSynthesizer, SynthesisRequest,
};

/// Azure Speech short-audio recognition and SSML synthesis
#[derive(Debug, Clone)]
pub struct AzureSpeechClient {
    client: Client,
    key: String,
    tts_region: String,
    stt_region: String,
}

impl AzureSpeechClient {
    pub fn new(key: impl Into<String>, tts_region: &str, stt_region: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            key: key.into(),
            tts_region: tts_region.to_string(),
            stt_region: stt_region.to_string(),
        })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Option<Self> {
        let key = settings.azure_speech_key.clone()?;
        Self::new(key, &settings.tts_region, &settings.stt_region, settings.timeout_secs).ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

#[async_trait]
impl SpeechRecognizer for AzureSpeechClient {
    async fn recognize(&self, wav: Vec<u8>, language: Option<String>) -> Result<String, ProviderError> {
        let language = language.unwrap_or_else(|| "zh-CN".to_string());
        let url = format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
            self.stt_region
        );

        let response = self
            .client
            .post(url)
            .query(&[("language", language.as_str()), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "audio/wav; codecs=audio/pcm; samplerate=16000")
            .body(wav)
            .send()
            .await?;
        let parsed: RecognitionResponse = check_status("azure-stt", response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!(status = %parsed.recognition_status, %language, "azure recognition finished");
        match (parsed.recognition_status.as_str(), parsed.display_text) {
            ("Success", Some(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            (status, _) => Err(ProviderError::InvalidResponse(format!("recognition status {}", status))),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeechClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
        let url = format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", self.tts_region);
        let ssml = build_ssml(&request.text, &request.voice, &request.style);

        let response = self
            .client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "riff-24khz-16bit-mono-pcm")
            .body(ssml)
            .send()
            .await?;
        let response = check_status("azure-tts", response).await?;

        let is_audio = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("audio"))
            .unwrap_or(true);
        let bytes = response.bytes().await?;
        if !is_audio || bytes.is_empty() {
            return Err(ProviderError::InvalidResponse("response is not audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// SSML document; `mstts:express-as` only when a style other than neutral is requested
pub(crate) fn build_ssml(text: &str, voice: &str, style: &str) -> String {
    let text = escape_xml(text);
    if style.is_empty() || style == "neutral" {
        format!(
            "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" xml:lang=\"zh-CN\"><voice name=\"{}\">{}</voice></speak>",
            voice, text
        )
    } else {
        format!(
            "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" xmlns:mstts=\"http://www.w3.org/2001/mstts\" xml:lang=\"zh-CN\"><voice name=\"{}\"><mstts:express-as style=\"{}\">{}</mstts:express-as></voice></speak>",
            voice, style, text
        )
    }
}

/// Text Analytics v3.1 sentiment endpoint
#[derive(Debug, Clone)]
pub struct AzureTextAnalyticsClient {
    client: Client,
    key: String,
    endpoint: String,
}

impl AzureTextAnalyticsClient {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Result<Self, ProviderError> {
        // Sentiment sits on the interactive path, so it gets a short timeout.
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(Self {
            client,
            key: key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Option<Self> {
        let key = settings.azure_emotion_key.clone()?;
        let endpoint = settings.azure_emotion_endpoint.clone()?;
        Self::new(endpoint, key).ok()
    }
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    documents: Vec<SentimentDocument>,
}

#[derive(Debug, Deserialize)]
struct SentimentDocument {
    sentiment: String,
}

#[async_trait]
impl SentimentAnalyzer for AzureTextAnalyticsClient {
    async fn sentiment(&self, text: String, language: String) -> Result<String, ProviderError> {
        let body = json!({
            "documents": [{ "id": "1", "language": language, "text": text }]
        });

        let response = self
            .client
            .post(format!("{}/text/analytics/v3.1/sentiment", self.endpoint))
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(&body)
            .send()
            .await?;
        let parsed: SentimentResponse = check_status("azure-text-analytics", response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .documents
            .into_iter()
            .next()
            .map(|doc| doc.sentiment)
            .ok_or_else(|| ProviderError::InvalidResponse("no documents in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssml_with_style() {
        let ssml = build_ssml("今天真好", "zh-CN-XiaoxiaoNeural", "cheerful");
        assert!(ssml.contains("xmlns:mstts=\"http://www.w3.org/2001/mstts\""));
        assert!(ssml.contains("<voice name=\"zh-CN-XiaoxiaoNeural\">"));
        assert!(ssml.contains("<mstts:express-as style=\"cheerful\">今天真好</mstts:express-as>"));
    }

    #[test]
    fn test_ssml_neutral_has_no_express_as() {
        let ssml = build_ssml("a < b", "en-US-JennyNeural", "neutral");
        assert!(!ssml.contains("express-as"));
        assert!(ssml.contains("a &lt; b"));
    }

    #[test]
    fn test_sentiment_client_needs_endpoint_and_key() {
        let mut settings = ProviderSettings::default();
        settings.azure_emotion_key = Some("k".to_string());
        assert!(AzureTextAnalyticsClient::from_settings(&settings).is_none());

        settings.azure_emotion_endpoint = Some("https://example.cognitiveservices.azure.com/".to_string());
        let client = AzureTextAnalyticsClient::from_settings(&settings).unwrap();
        assert_eq!(client.endpoint, "https://example.cognitiveservices.azure.com");
    }
}
