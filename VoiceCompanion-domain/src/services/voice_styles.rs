//! Voice style catalogue: which Azure neural voice speaks each language

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::language::{self, SUPPORTED_LANGUAGES};

/// Style used when none or an unknown one is requested
pub const DEFAULT_VOICE_STYLE: &str = "default";

struct VoiceStyle {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    /// Voices in `SUPPORTED_LANGUAGES` order
    voices: [&'static str; 10],
}

const SOFT_FEMALE_VOICES: [&str; 10] = [
    "zh-CN-XiaoxiaoNeural",
    "en-US-JennyNeural",
    "ja-JP-NanamiNeural",
    "ko-KR-SunHiNeural",
    "fr-FR-DeniseNeural",
    "de-DE-KatjaNeural",
    "es-ES-ElviraNeural",
    "ru-RU-SvetlanaNeural",
    "ar-SA-ZariyahNeural",
    "hi-IN-SwaraNeural",
];

const STYLES: [VoiceStyle; 5] = [
    VoiceStyle {
        id: "xiaoxiao",
        name: "小晓",
        description: "温柔甜美的女声",
        voices: SOFT_FEMALE_VOICES,
    },
    VoiceStyle {
        id: "yunxi",
        name: "云希",
        description: "成熟稳重的男声",
        voices: [
            "zh-CN-YunxiNeural",
            "en-US-GuyNeural",
            "ja-JP-KeitaNeural",
            "ko-KR-InJoonNeural",
            "fr-FR-HenriNeural",
            "de-DE-ConradNeural",
            "es-ES-AlvaroNeural",
            "ru-RU-DmitryNeural",
            "ar-SA-HamedNeural",
            "hi-IN-MadhurNeural",
        ],
    },
    VoiceStyle {
        id: "yunyang",
        name: "云扬",
        description: "专业播报的男声",
        voices: [
            "zh-CN-YunyangNeural",
            "en-US-AriaNeural",
            "ja-JP-NaokiNeural",
            "ko-KR-YuJinNeural",
            "fr-FR-AlainNeural",
            "de-DE-AmalaNeural",
            "es-ES-LaiaNeural",
            "ru-RU-DariyaNeural",
            "ar-SA-SalimNeural",
            "hi-IN-AarohiNeural",
        ],
    },
    VoiceStyle {
        id: "xiaoyi",
        name: "小艺",
        description: "活泼可爱的女声",
        voices: [
            "zh-CN-XiaoyiNeural",
            "en-US-JennyNeural",
            "ja-JP-NanamiNeural",
            "ko-KR-SunHiNeural",
            "fr-FR-DeniseNeural",
            "de-DE-KatjaNeural",
            "es-ES-ElviraNeural",
            "ru-RU-SvetlanaNeural",
            "ar-SA-ZariyahNeural",
            "hi-IN-SwaraNeural",
        ],
    },
    VoiceStyle {
        id: DEFAULT_VOICE_STYLE,
        name: "默认",
        description: "标准AI助手音色",
        voices: SOFT_FEMALE_VOICES,
    },
];

fn find(style_id: &str) -> Option<&'static VoiceStyle> {
    STYLES.iter().find(|style| style.id == style_id)
}

impl VoiceStyle {
    /// Voice for a language; the Chinese voice stands in for unsupported ones
    fn voice_for(&self, language: &str) -> &'static str {
        SUPPORTED_LANGUAGES
            .iter()
            .position(|code| *code == language)
            .map(|index| self.voices[index])
            .unwrap_or(self.voices[0])
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoiceStyleSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoiceStyleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Language code to Azure voice
    pub voices: std::collections::BTreeMap<String, String>,
    pub fallback: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoicePreview {
    pub voice_style: String,
    pub language: String,
    pub voice: String,
    pub style_name: String,
    pub description: String,
    pub is_supported: bool,
}

pub fn list_voice_styles() -> Vec<VoiceStyleSummary> {
    STYLES
        .iter()
        .map(|style| VoiceStyleSummary {
            id: style.id.to_string(),
            name: style.name.to_string(),
            description: style.description.to_string(),
        })
        .collect()
}

pub fn voice_style_info(style_id: &str) -> Option<VoiceStyleInfo> {
    find(style_id).map(|style| VoiceStyleInfo {
        id: style.id.to_string(),
        name: style.name.to_string(),
        description: style.description.to_string(),
        voices: SUPPORTED_LANGUAGES
            .iter()
            .zip(style.voices.iter())
            .map(|(code, voice)| (code.to_string(), voice.to_string()))
            .collect(),
        fallback: style.voices[0].to_string(),
    })
}

pub fn is_valid_voice_style(style_id: &str) -> bool {
    find(style_id).is_some()
}

/// Azure voice for a style and language; unknown styles use the default style
pub fn voice_for(style_id: &str, language: &str) -> &'static str {
    find(style_id)
        .or_else(|| find(DEFAULT_VOICE_STYLE))
        .map(|style| style.voice_for(language))
        .unwrap_or(SOFT_FEMALE_VOICES[0])
}

pub fn voice_style_name(style_id: &str) -> &'static str {
    find(style_id).map(|style| style.name).unwrap_or("未知音色")
}

/// Languages a style can speak
pub fn style_languages(style_id: &str) -> Option<Vec<String>> {
    find(style_id).map(|_| SUPPORTED_LANGUAGES.iter().map(|code| code.to_string()).collect())
}

pub fn preview(style_id: &str, language: &str) -> VoicePreview {
    match find(style_id) {
        Some(style) => VoicePreview {
            voice_style: style_id.to_string(),
            language: language.to_string(),
            voice: style.voice_for(language).to_string(),
            style_name: style.name.to_string(),
            description: style.description.to_string(),
            is_supported: language::is_supported(language),
        },
        None => VoicePreview {
            voice_style: style_id.to_string(),
            language: language.to_string(),
            voice: voice_for(DEFAULT_VOICE_STYLE, language).to_string(),
            style_name: "未知".to_string(),
            description: String::new(),
            is_supported: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_lookup() {
        assert_eq!(voice_for("yunxi", "en"), "en-US-GuyNeural");
        assert_eq!(voice_for("xiaoyi", "zh"), "zh-CN-XiaoyiNeural");
        assert_eq!(voice_for("xiaoyi", "ja"), "ja-JP-NanamiNeural");
        assert_eq!(voice_for("yunyang", "pt"), "zh-CN-YunyangNeural");
        assert_eq!(voice_for("nope", "ko"), "ko-KR-SunHiNeural");
    }

    #[test]
    fn test_catalogue() {
        let styles = list_voice_styles();
        assert_eq!(styles.len(), 5);
        assert!(styles.iter().any(|s| s.id == "default" && s.name == "默认"));

        let info = voice_style_info("yunxi").unwrap();
        assert_eq!(info.voices.len(), 10);
        assert_eq!(info.voices["hi"], "hi-IN-MadhurNeural");
        assert!(voice_style_info("missing").is_none());
        assert_eq!(voice_style_name("missing"), "未知音色");
        assert_eq!(style_languages("xiaoxiao").unwrap().len(), 10);
    }

    #[test]
    fn test_preview() {
        let known = preview("xiaoxiao", "fr");
        assert_eq!(known.voice, "fr-FR-DeniseNeural");
        assert!(known.is_supported);

        let unknown = preview("robot", "en");
        assert_eq!(unknown.style_name, "未知");
        assert!(unknown.description.is_empty());
        assert!(!unknown.is_supported);
    }
}
