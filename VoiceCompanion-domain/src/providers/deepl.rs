//! DeepL translation (free API host)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{build_http_client, check_status, ProviderError, ProviderSettings, TextTranslator};

const DEEPL_URL: &str = "https://api-free.deepl.com/v2/translate";

#[derive(Debug, Clone)]
pub struct DeepLClient {
    client: Client,
    api_key: String,
    url: String,
}

impl DeepLClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            api_key: api_key.into(),
            url: DEEPL_URL.to_string(),
        })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Option<Self> {
        let key = settings.deepl_api_key.clone()?;
        Self::new(key, settings.timeout_secs).ok()
    }
}

/// DeepL language code for a short code
pub fn deepl_language_code(code: &str) -> String {
    match code {
        "zh" => "ZH".to_string(),
        "en" => "EN".to_string(),
        "ja" => "JA".to_string(),
        "ko" => "KO".to_string(),
        "fr" => "FR".to_string(),
        "de" => "DE".to_string(),
        "es" => "ES".to_string(),
        "ru" => "RU".to_string(),
        other => other.to_uppercase(),
    }
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[async_trait]
impl TextTranslator for DeepLClient {
    async fn translate(&self, text: String, source: String, target: String) -> Result<String, ProviderError> {
        let form = [
            ("text", text),
            ("source_lang", deepl_language_code(&source)),
            ("target_lang", deepl_language_code(&target)),
        ];

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&form)
            .send()
            .await?;
        let parsed: TranslateResponse = check_status("deepl", response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ProviderError::InvalidResponse("no translations in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(deepl_language_code("zh"), "ZH");
        assert_eq!(deepl_language_code("ru"), "RU");
        assert_eq!(deepl_language_code("pt"), "PT");
    }
}
