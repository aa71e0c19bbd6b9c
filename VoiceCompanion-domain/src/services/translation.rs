use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::providers::{ChatMessage, ChatModel, ChatRequest, TextTranslator};
use crate::services::language::{self, chinese_name, detect_by_script};

const TRANSLATION_MODEL: &str = "gpt-3.5-turbo";

/// Translation and language detection over DeepL and OpenAI.
///
/// Translation never fails: when every provider errors the original text is returned.
#[derive(Clone, Default)]
pub struct TranslationService {
    deepl: Option<Arc<dyn TextTranslator>>,
    chat: Option<Arc<dyn ChatModel>>,
}

impl TranslationService {
    pub fn new(deepl: Option<Arc<dyn TextTranslator>>, chat: Option<Arc<dyn ChatModel>>) -> Self {
        Self { deepl, chat }
    }

    /// Translate `text` from `from` to `to` (short codes)
    pub async fn translate(&self, text: &str, from: &str, to: &str) -> String {
        if from == to || text.trim().is_empty() {
            return text.to_string();
        }

        if let Some(deepl) = &self.deepl {
            match deepl.translate(text.to_string(), from.to_string(), to.to_string()).await {
                Ok(translated) if !translated.trim().is_empty() => return translated,
                Ok(_) => warn!("DeepL returned an empty translation"),
                Err(e) => warn!("DeepL translation failed: {}", e),
            }
        }

        if let Some(chat) = &self.chat {
            let prompt = format!(
                "请将以下文本从{}翻译成{}：\n{}\n请只返回翻译结果，不要其他内容。",
                chinese_name(from),
                chinese_name(to),
                text
            );
            let request = ChatRequest::new(TRANSLATION_MODEL, vec![ChatMessage::user(prompt)], 1000);
            match chat.complete(request).await {
                Ok(translated) => return translated,
                Err(e) => warn!("OpenAI translation failed: {}", e),
            }
        }

        debug!("No translation available for {} -> {}, returning original text", from, to);
        text.to_string()
    }

    pub async fn translate_batch(&self, texts: &[String], from: &str, to: &str) -> Vec<String> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text, from, to).await);
        }
        results
    }

    /// Short language code of `text`: OpenAI when it answers with a supported code, else the script heuristic
    pub async fn detect_language(&self, text: &str) -> String {
        if let Some(chat) = &self.chat {
            let options = language::SUPPORTED_LANGUAGES
                .iter()
                .map(|code| format!("- {}: {}", code, chinese_name(code)))
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = format!(
                "检测以下文本的语言，从以下选项中选择：\n{}\n\n文本: {}\n\n请只返回语言代码，不要其他内容。",
                options, text
            );
            let request = ChatRequest::new(TRANSLATION_MODEL, vec![ChatMessage::user(prompt)], 100);
            match chat.complete(request).await {
                Ok(answer) => {
                    let code = answer.trim().to_lowercase();
                    if language::is_supported(&code) {
                        return code;
                    }
                    debug!("Ignoring unsupported language answer: {}", answer);
                }
                Err(e) => warn!("OpenAI language detection failed: {}", e),
            }
        }

        detect_by_script(text).to_string()
    }

    pub fn supported_languages(&self) -> BTreeMap<String, String> {
        language::supported_languages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockChatModel, MockTextTranslator, ProviderError};

    #[tokio::test]
    async fn test_same_language_is_identity() {
        let mut deepl = MockTextTranslator::new();
        deepl.expect_translate().never();
        let service = TranslationService::new(Some(Arc::new(deepl)), None);

        assert_eq!(service.translate("你好", "zh", "zh").await, "你好");
    }

    #[tokio::test]
    async fn test_deepl_first() {
        let mut deepl = MockTextTranslator::new();
        deepl
            .expect_translate()
            .withf(|text, source, target| text == "你好" && source == "zh" && target == "en")
            .returning(|_, _, _| Ok("Hello".to_string()));
        let mut chat = MockChatModel::new();
        chat.expect_complete().never();

        let service = TranslationService::new(Some(Arc::new(deepl)), Some(Arc::new(chat)));
        assert_eq!(service.translate("你好", "zh", "en").await, "Hello");
    }

    #[tokio::test]
    async fn test_falls_back_to_openai_then_original() {
        let mut deepl = MockTextTranslator::new();
        deepl
            .expect_translate()
            .returning(|_, _, _| Err(ProviderError::Request("down".to_string())));
        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .withf(|request| request.messages[0].content.starts_with("请将以下文本从中文翻译成英文"))
            .returning(|_| Ok("Hello".to_string()));

        let service = TranslationService::new(Some(Arc::new(deepl)), Some(Arc::new(chat)));
        assert_eq!(service.translate("你好", "zh", "en").await, "Hello");

        let offline = TranslationService::default();
        assert_eq!(offline.translate("你好", "zh", "en").await, "你好");
    }

    #[tokio::test]
    async fn test_translate_batch_keeps_order() {
        let service = TranslationService::default();
        let texts = vec!["一".to_string(), "二".to_string()];
        assert_eq!(service.translate_batch(&texts, "zh", "en").await, texts);
    }

    #[tokio::test]
    async fn test_detect_language() {
        let mut chat = MockChatModel::new();
        chat.expect_complete().times(1).returning(|_| Ok("ja".to_string()));
        let service = TranslationService::new(None, Some(Arc::new(chat)));
        assert_eq!(service.detect_language("こんにちは").await, "ja");

        let mut chat = MockChatModel::new();
        chat.expect_complete().returning(|_| Ok("klingon".to_string()));
        let service = TranslationService::new(None, Some(Arc::new(chat)));
        assert_eq!(service.detect_language("Привет").await, "ru");
    }
}
