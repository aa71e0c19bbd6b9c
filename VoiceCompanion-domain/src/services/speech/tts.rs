use std::sync::Arc;

use tracing::{info, warn};

use super::wav::{speech_like_tone, ToneShape};
use crate::providers::{SpeechSynthesizer, SynthesisRequest};
use crate::services::emotion::Emotion;
use crate::services::voice_styles::{self, DEFAULT_VOICE_STYLE};

/// OpenAI voice used for every language
const OPENAI_VOICE: &str = "alloy";

/// How an emotion is spoken
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionVoice {
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
    /// Azure `mstts:express-as` style
    pub style: &'static str,
}

pub fn emotion_voice(emotion: Emotion) -> EmotionVoice {
    let (rate, pitch, volume, style) = match emotion {
        Emotion::Happy => (1.2, 1.1, 1.1, "cheerful"),
        Emotion::Sad => (0.8, 0.9, 0.9, "sad"),
        Emotion::Angry => (1.3, 1.2, 1.3, "angry"),
        Emotion::Anxious => (1.1, 1.05, 1.0, "worried"),
        Emotion::Calm => (0.9, 1.0, 0.95, "calm"),
        Emotion::Neutral => (1.0, 1.0, 1.0, "neutral"),
    };
    EmotionVoice { rate, pitch, volume, style }
}

/// Seconds of locally generated audio for a text: longer texts and slower styles last longer
pub fn local_duration(text: &str, style: &str) -> f64 {
    let base = match text.chars().count() {
        n if n < 10 => 1.0,
        n if n < 30 => 2.0,
        n if n < 50 => 3.0,
        _ => 4.0,
    };
    let multiplier = match style {
        "cheerful" => 0.9,
        "sad" => 1.3,
        "angry" => 0.8,
        "worried" => 1.1,
        "calm" => 1.2,
        _ => 1.0,
    };
    base * multiplier
}

/// Text-to-speech over Azure and OpenAI with a local tone as the last resort
#[derive(Clone, Default)]
pub struct TtsService {
    azure: Option<Arc<dyn SpeechSynthesizer>>,
    openai: Option<Arc<dyn SpeechSynthesizer>>,
}

impl TtsService {
    pub fn new(azure: Option<Arc<dyn SpeechSynthesizer>>, openai: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { azure, openai }
    }

    /// Audio for `text` and the engine that produced it (`azure`, `openai` or `local`).
    ///
    /// Unknown voice styles fall back to the default style.
    pub async fn synthesize(
        &self,
        text: &str,
        lang: &str,
        emotion: Emotion,
        voice_style: Option<&str>,
    ) -> (Vec<u8>, &'static str) {
        let params = emotion_voice(emotion);
        let style_id = match voice_style {
            Some(id) if voice_styles::is_valid_voice_style(id) => id,
            Some(id) => {
                warn!("Unknown voice style {}, using the default", id);
                DEFAULT_VOICE_STYLE
            }
            None => DEFAULT_VOICE_STYLE,
        };
        let voice = voice_styles::voice_for(style_id, lang);
        info!(
            style_id,
            style_name = voice_styles::voice_style_name(style_id),
            lang,
            voice,
            "Synthesizing speech"
        );

        if let Some(azure) = &self.azure {
            let request = SynthesisRequest {
                text: text.to_string(),
                voice: voice.to_string(),
                style: params.style.to_string(),
                rate: params.rate,
            };
            match azure.synthesize(request).await {
                Ok(audio) => return (audio, "azure"),
                Err(e) => warn!("Azure synthesis failed: {}", e),
            }
        }

        if let Some(openai) = &self.openai {
            let request = SynthesisRequest {
                text: text.to_string(),
                voice: OPENAI_VOICE.to_string(),
                style: params.style.to_string(),
                rate: params.rate,
            };
            match openai.synthesize(request).await {
                Ok(audio) => return (audio, "openai"),
                Err(e) => warn!("OpenAI synthesis failed: {}", e),
            }
        }

        let shape = ToneShape { pitch: params.pitch, volume: params.volume };
        (speech_like_tone(local_duration(text, params.style), shape, params.style), "local")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockSpeechSynthesizer, ProviderError};

    #[test]
    fn test_emotion_parameters() {
        let happy = emotion_voice(Emotion::Happy);
        assert_eq!(happy.rate, 1.2);
        assert_eq!(happy.style, "cheerful");
        assert_eq!(emotion_voice(Emotion::Neutral).style, "neutral");
    }

    #[test]
    fn test_local_duration() {
        assert_eq!(local_duration("短句", "neutral"), 1.0);
        assert!((local_duration(&"字".repeat(20), "sad") - 2.6).abs() < 1e-9);
        assert_eq!(local_duration(&"a".repeat(60), "neutral"), 4.0);
    }

    #[tokio::test]
    async fn test_azure_gets_style_voice() {
        let mut azure = MockSpeechSynthesizer::new();
        azure
            .expect_synthesize()
            .withf(|request| request.voice == "en-US-GuyNeural" && request.style == "sad")
            .returning(|_| Ok(b"RIFFaudio".to_vec()));
        let service = TtsService::new(Some(Arc::new(azure)), None);

        let (audio, method) = service.synthesize("Hello", "en", Emotion::Sad, Some("yunxi")).await;
        assert_eq!(method, "azure");
        assert_eq!(audio, b"RIFFaudio".to_vec());
    }

    #[tokio::test]
    async fn test_invalid_style_uses_default_voice() {
        let mut azure = MockSpeechSynthesizer::new();
        azure
            .expect_synthesize()
            .withf(|request| request.voice == "ja-JP-NanamiNeural")
            .returning(|_| Ok(vec![1]));
        let service = TtsService::new(Some(Arc::new(azure)), None);

        let (_, method) = service.synthesize("こんにちは", "ja", Emotion::Neutral, Some("robot")).await;
        assert_eq!(method, "azure");
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_local() {
        let mut azure = MockSpeechSynthesizer::new();
        azure
            .expect_synthesize()
            .returning(|_| Err(ProviderError::Status { status: 401, message: "bad key".to_string() }));
        let mut openai = MockSpeechSynthesizer::new();
        openai
            .expect_synthesize()
            .withf(|request| request.voice == "alloy" && request.rate == 1.3)
            .returning(|_| Err(ProviderError::Request("timeout".to_string())));
        let service = TtsService::new(Some(Arc::new(azure)), Some(Arc::new(openai)));

        let (audio, method) = service.synthesize("好", "zh", Emotion::Angry, None).await;
        assert_eq!(method, "local");
        assert!(audio.starts_with(b"RIFF"));
        // 1 s base * 0.8 for angry at 16 kHz, 16-bit
        assert_eq!(audio.len(), 44 + 12_800 * 2);
    }
}
