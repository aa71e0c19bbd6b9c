use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::wav::ensure_wav;
use crate::providers::SpeechRecognizer;
use crate::services::language::{azure_locale, detect_by_script, script_matches, SUPPORTED_LANGUAGES};

/// Apologies spoken back when nothing could be recognized
const APOLOGIES: [&str; 18] = [
    "Sorry, my ears just went on vacation—could you run that by me again?",
    "Oops, my brain just buffered… mind hitting repeat?",
    "Sorry, my ears were on coffee break—could you say that again?",
    "Wait… was that English or did my brain just auto-translate it to gibberish?",
    "Oops, my attention span just tripped over itself—mind repeating?",
    "Sorry, my ears were buffering like bad Wi-Fi—could you reload that?",
    "Hold on, my mental subtitles didn't show up—could you rerun that scene?",
    "Wait, I think I was momentarily tuned into another frequency—could you say it again?",
    "Sorry, my ears just blinked—can you rewind?",
    "Oops, my listening app just crashed—can you restart the sentence?",
    "Hold up, my brain was lagging—mind hitting refresh?",
    "Sorry, my ears went into airplane mode—could you repeat that?",
    "Wait, my brain's GPS lost signal—where were we again?",
    "Oops, I think my ears muted themselves—could you unmute?",
    "My brain skipped that like a scratched CD—can you play it again?",
    "Sorry, I was daydreaming in another dimension—what did you say?",
    "Hold on, my mind just took a coffee break—could you repeat?",
    "Oops, that went in one ear and got lost in traffic—say it again?",
];

/// Outcome of a recognition attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcription {
    /// False when the text is a fallback apology rather than what was said
    pub succ: bool,
    pub text: String,
    pub lang: String,
    /// `openai`, `azure` or `intelligent_fallback`
    pub method: String,
}

impl Transcription {
    fn recognized(text: String, lang: &str, method: &str) -> Self {
        Self { succ: true, text, lang: lang.to_string(), method: method.to_string() }
    }

    fn fallback() -> Self {
        let text = APOLOGIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(APOLOGIES[0]);
        Self {
            succ: false,
            text: text.to_string(),
            lang: "en".to_string(),
            method: "intelligent_fallback".to_string(),
        }
    }
}

/// Speech-to-text over Whisper and Azure
#[derive(Clone, Default)]
pub struct SttService {
    whisper: Option<Arc<dyn SpeechRecognizer>>,
    azure: Option<Arc<dyn SpeechRecognizer>>,
}

impl SttService {
    pub fn new(whisper: Option<Arc<dyn SpeechRecognizer>>, azure: Option<Arc<dyn SpeechRecognizer>>) -> Self {
        Self { whisper, azure }
    }

    /// Recognize a recording (WAV or raw 16 kHz PCM).
    ///
    /// Whisper runs with automatic language detection and its text decides the
    /// language. Azure is then tried one locale at a time, `preferred` first.
    /// A transcript only counts when its script agrees with the language.
    pub async fn transcribe(&self, audio: Vec<u8>, preferred: Option<&str>) -> Transcription {
        if audio.is_empty() {
            return Transcription::fallback();
        }
        let wav = ensure_wav(audio);

        if let Some(whisper) = &self.whisper {
            match whisper.recognize(wav.clone(), None).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    let lang = detect_by_script(&text);
                    if script_matches(&text, lang) {
                        info!(%lang, "Whisper recognized speech");
                        return Transcription::recognized(text, lang, "openai");
                    }
                    debug!("Whisper transcript rejected: {:?}", text);
                }
                Err(e) => warn!("Whisper recognition failed: {}", e),
            }
        }

        if let Some(azure) = &self.azure {
            let mut order: Vec<&str> = Vec::with_capacity(SUPPORTED_LANGUAGES.len());
            if let Some(first) = preferred.filter(|p| SUPPORTED_LANGUAGES.contains(p)) {
                order.push(first);
            }
            order.extend(SUPPORTED_LANGUAGES.iter().copied().filter(|code| Some(*code) != preferred));

            for lang in order {
                match azure.recognize(wav.clone(), Some(azure_locale(lang).to_string())).await {
                    Ok(text) if script_matches(&text, lang) => {
                        info!(%lang, "Azure recognized speech");
                        return Transcription::recognized(text, lang, "azure");
                    }
                    Ok(text) => debug!(%lang, "Azure transcript rejected: {:?}", text),
                    Err(e) => debug!(%lang, "Azure recognition failed: {}", e),
                }
            }
        }

        warn!("All speech recognizers failed, answering with an apology");
        Transcription::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockSpeechRecognizer, ProviderError};

    #[tokio::test]
    async fn test_whisper_first() {
        let mut whisper = MockSpeechRecognizer::new();
        whisper
            .expect_recognize()
            .withf(|wav, language| wav.starts_with(b"RIFF") && language.is_none())
            .returning(|_, _| Ok(" 你好 ".to_string()));
        let service = SttService::new(Some(Arc::new(whisper)), None);

        let result = service.transcribe(vec![0u8; 64], None).await;
        assert_eq!(result, Transcription::recognized("你好".to_string(), "zh", "openai"));
    }

    #[tokio::test]
    async fn test_azure_walks_locales_until_script_matches() {
        let mut whisper = MockSpeechRecognizer::new();
        whisper
            .expect_recognize()
            .returning(|_, _| Err(ProviderError::Request("down".to_string())));
        let mut azure = MockSpeechRecognizer::new();
        azure.expect_recognize().returning(|_, language| match language.as_deref() {
            Some("ko-KR") => Ok("안녕하세요".to_string()),
            // a Latin transcript never satisfies the Chinese locale
            Some("zh-CN") => Ok("hello".to_string()),
            _ => Err(ProviderError::InvalidResponse("NoMatch".to_string())),
        });
        let service = SttService::new(Some(Arc::new(whisper)), Some(Arc::new(azure)));

        let result = service.transcribe(vec![1u8; 64], None).await;
        assert!(result.succ);
        assert_eq!(result.lang, "ko");
        assert_eq!(result.text, "안녕하세요");
    }

    #[tokio::test]
    async fn test_preferred_locale_goes_first() {
        let mut azure = MockSpeechRecognizer::new();
        azure
            .expect_recognize()
            .times(1)
            .withf(|_, language| language.as_deref() == Some("ko-KR"))
            .returning(|_, _| Ok("안녕하세요".to_string()));
        let service = SttService::new(None, Some(Arc::new(azure)));

        let result = service.transcribe(vec![1u8; 64], Some("ko")).await;
        assert_eq!(result.lang, "ko");
        assert_eq!(result.method, "azure");
    }

    #[tokio::test]
    async fn test_fallback_apology() {
        let result = SttService::default().transcribe(vec![1u8; 64], None).await;
        assert!(!result.succ);
        assert_eq!(result.lang, "en");
        assert_eq!(result.method, "intelligent_fallback");
        assert!(APOLOGIES.contains(&result.text.as_str()));
    }
}
