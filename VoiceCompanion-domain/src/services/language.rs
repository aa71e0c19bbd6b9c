//! Supported languages and script-based heuristics

use std::collections::BTreeMap;

/// Short codes of every supported language, in display order
pub const SUPPORTED_LANGUAGES: [&str; 10] = ["zh", "en", "ja", "ko", "fr", "de", "es", "ru", "ar", "hi"];

/// Language used when nothing better is known
pub const DEFAULT_LANGUAGE: &str = "zh";

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}

/// Name of a language in its own script
pub fn native_name(code: &str) -> Option<&'static str> {
    Some(match code {
        "zh" => "中文",
        "en" => "English",
        "ja" => "日本語",
        "ko" => "한국어",
        "fr" => "Français",
        "de" => "Deutsch",
        "es" => "Español",
        "ru" => "Русский",
        "ar" => "العربية",
        "hi" => "हिन्दी",
        _ => return None,
    })
}

/// Chinese name of a language, used in prompts; unknown codes pass through
pub fn chinese_name(code: &str) -> String {
    match code {
        "zh" => "中文",
        "en" => "英文",
        "ja" => "日文",
        "ko" => "韩文",
        "fr" => "法文",
        "de" => "德文",
        "es" => "西班牙文",
        "ru" => "俄文",
        "ar" => "阿拉伯文",
        "hi" => "印地文",
        other => other,
    }
    .to_string()
}

/// Code to native name for all supported languages
pub fn supported_languages() -> BTreeMap<String, String> {
    SUPPORTED_LANGUAGES
        .iter()
        .filter_map(|code| native_name(code).map(|name| (code.to_string(), name.to_string())))
        .collect()
}

/// Azure locale for a short code
pub fn azure_locale(code: &str) -> &'static str {
    match code {
        "en" => "en-US",
        "ja" => "ja-JP",
        "ko" => "ko-KR",
        "fr" => "fr-FR",
        "de" => "de-DE",
        "es" => "es-ES",
        "ru" => "ru-RU",
        "ar" => "ar-SA",
        "hi" => "hi-IN",
        _ => "zh-CN",
    }
}

/// Recognition confidence a transcript must reach in this language
pub fn confidence_threshold(code: &str) -> f64 {
    match code {
        "ar" | "hi" => 0.6,
        _ => 0.7,
    }
}

/// Short code for a locale or code (`en-GB` gives `en`); unknown values give `zh`
pub fn normalize_language_code(code: &str) -> &'static str {
    let lower = code.trim().to_lowercase();
    let primary = lower.split(['-', '_']).next().unwrap_or_default();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|supported| *supported == primary)
        .unwrap_or(DEFAULT_LANGUAGE)
}

fn is_han(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{309f}').contains(&c) || ('\u{30a0}'..='\u{30ff}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7af}').contains(&c)
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06ff}').contains(&c)
}

fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097f}').contains(&c)
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04ff}').contains(&c)
}

/// Guess the language from the characters used.
///
/// Han text is Chinese unless it also carries kana. Latin text is told apart
/// by its accented letters and defaults to English.
pub fn detect_by_script(text: &str) -> &'static str {
    let has = |pred: fn(char) -> bool| text.chars().any(pred);

    if has(is_han) && !has(is_kana) {
        "zh"
    } else if has(is_kana) {
        "ja"
    } else if has(is_hangul) {
        "ko"
    } else if has(is_arabic) {
        "ar"
    } else if has(is_devanagari) {
        "hi"
    } else if has(is_cyrillic) {
        "ru"
    } else if text.chars().any(|c| "äöüßÄÖÜ".contains(c)) {
        "de"
    } else if text.chars().any(|c| "àâéèêëïîôùûÿçœÀÂÉÈÊËÏÎÔÙÛŸÇŒ".contains(c)) {
        "fr"
    } else if text.chars().any(|c| "ñáíóúÑÁÍÓÚ¿¡".contains(c)) {
        "es"
    } else {
        "en"
    }
}

/// Whether a transcript plausibly is in `language`.
///
/// Script-bound languages need at least one character of their script;
/// Latin and Cyrillic languages only need non-blank text.
pub fn script_matches(text: &str, language: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    match language {
        "zh" => text.chars().any(is_han),
        "ja" => text.chars().any(|c| is_kana(c) || is_han(c)),
        "ko" => text.chars().any(is_hangul),
        "ar" => text.chars().any(is_arabic),
        "hi" => text.chars().any(is_devanagari),
        _ => true,
    }
}

/// Split text into sentences for per-sentence synthesis
pub fn split_sentences(text: &str, language: &str) -> Vec<String> {
    let delimiters: &[char] = match language {
        "zh" | "ja" => &['。', '！', '？', '；'],
        "ar" => &['.', '!', '?', ';', '؟'],
        _ => &['.', '!', '?', ';'],
    };

    text.split(|c: char| delimiters.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_script() {
        assert_eq!(detect_by_script("你好世界"), "zh");
        assert_eq!(detect_by_script("こんにちは世界"), "ja");
        assert_eq!(detect_by_script("안녕하세요"), "ko");
        assert_eq!(detect_by_script("مرحبا"), "ar");
        assert_eq!(detect_by_script("नमस्ते"), "hi");
        assert_eq!(detect_by_script("Привет"), "ru");
        assert_eq!(detect_by_script("Schöne Grüße"), "de");
        assert_eq!(detect_by_script("Ça va très bien"), "fr");
        assert_eq!(detect_by_script("¿Cómo estás, señor?"), "es");
        assert_eq!(detect_by_script("hello there"), "en");
    }

    #[test]
    fn test_normalize_language_code() {
        assert_eq!(normalize_language_code("zh-CN"), "zh");
        assert_eq!(normalize_language_code("en-GB"), "en");
        assert_eq!(normalize_language_code("hi"), "hi");
        assert_eq!(normalize_language_code("pt-BR"), "zh");
    }

    #[test]
    fn test_script_matches() {
        assert!(script_matches("你好", "zh"));
        assert!(!script_matches("hello", "zh"));
        assert!(script_matches("hello", "fr"));
        assert!(!script_matches("   ", "en"));
        assert!(!script_matches("hello", "ar"));
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(split_sentences("你好。今天天气不错！要出去吗？", "zh"), vec!["你好", "今天天气不错", "要出去吗"]);
        assert_eq!(split_sentences("Hi. How are you? ", "en"), vec!["Hi", "How are you"]);
        assert_eq!(split_sentences("مرحبا؟ كيف حالك.", "ar"), vec!["مرحبا", "كيف حالك"]);
        assert!(split_sentences("。。", "zh").is_empty());
    }

    #[test]
    fn test_supported_languages_table() {
        let languages = supported_languages();
        assert_eq!(languages.len(), 10);
        assert_eq!(languages["ja"], "日本語");
        assert_eq!(azure_locale("hi"), "hi-IN");
        assert_eq!(azure_locale("xx"), "zh-CN");
        assert_eq!(confidence_threshold("ar"), 0.6);
        assert_eq!(chinese_name("es"), "西班牙文");
    }
}
