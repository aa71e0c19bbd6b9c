use std::sync::Arc;

use tracing::warn;

use crate::providers::{ChatMessage, ChatModel, ChatRequest};
use crate::services::emotion::Emotion;
use crate::services::nlp::{GENERAL_INTENT_ID, GREETING_INTENT_ID, HEALTH_QUESTION_INTENT_ID};

/// What the explanation is about
#[derive(Debug, Clone, Copy)]
pub struct ExplainInput<'a> {
    pub text: &'a str,
    pub reply: &'a str,
    pub intent_id: i64,
    pub intent_description: &'a str,
    pub emotion: Emotion,
    pub lang: &'a str,
}

fn emotion_explanation(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Happy => "检测到您的心情比较愉快",
        Emotion::Sad => "检测到您可能有些低落",
        Emotion::Angry => "检测到您可能有些不满",
        Emotion::Anxious => "检测到您可能有些担心",
        Emotion::Calm => "检测到您的心情比较平静",
        Emotion::Neutral => "检测到您的心情比较中性",
    }
}

/// Why the intent was chosen and what the reply does about it
fn intent_explanations(intent_id: i64) -> Option<(&'static str, &'static str)> {
    match intent_id {
        GREETING_INTENT_ID => Some((
            "用户与AI进行问候或寒暄，AI会以友好、积极的方式回应，营造良好互动氛围",
            "AI通过问候语拉近与用户的距离，体现人文关怀",
        )),
        HEALTH_QUESTION_INTENT_ID => Some((
            "根据您提到的健康相关内容，我识别出您需要健康建议",
            "因此我提供了相关的健康建议来帮助您",
        )),
        GENERAL_INTENT_ID => Some(("我识别出这是一般性对话", "因此我提供了友好的回应")),
        _ => None,
    }
}

/// Explanation assembled from fixed phrases
pub fn rule_based_explanation(input: &ExplainInput<'_>) -> String {
    let mut parts = Vec::new();
    let intent = intent_explanations(input.intent_id);
    if let Some((why, _)) = intent {
        parts.push(why);
    }
    parts.push(emotion_explanation(input.emotion));
    if let Some((_, what)) = intent {
        parts.push(what);
    }
    format!("{}。", parts.join("。"))
}

/// Short natural-language justification of a reply, off unless enabled
#[derive(Clone, Default)]
pub struct ExplainService {
    chat: Option<Arc<dyn ChatModel>>,
    enabled: bool,
}

impl ExplainService {
    pub fn new(chat: Option<Arc<dyn ChatModel>>, enabled: bool) -> Self {
        Self { chat, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Explanation and its method (`openai` or `fallback`); empty when disabled
    pub async fn explain(&self, input: ExplainInput<'_>) -> (String, &'static str) {
        if !self.enabled {
            return (String::new(), "disabled");
        }

        if let Some(chat) = &self.chat {
            let prompt = format!(
                "作为AI健康助手，请解释为什么我会这样回复用户。\n\n用户输入: {}\nAI回复: {}\n识别意图: {}\n检测情感: {}\n\n请简要解释：\n1. 为什么识别出这个意图\n2. 为什么检测到这种情感\n3. 为什么给出这样的回复\n4. 这个回复如何帮助用户\n\n请用简洁的{}回答，不超过100字。",
                input.text, input.reply, input.intent_description, input.emotion, input.lang
            );
            let request = ChatRequest::new("gpt-3.5-turbo", vec![ChatMessage::user(prompt)], 1000);
            match chat.complete(request).await {
                Ok(explanation) if !explanation.is_empty() => return (explanation, "openai"),
                Ok(_) => warn!("OpenAI returned an empty explanation"),
                Err(e) => warn!("OpenAI explanation failed: {}", e),
            }
        }

        (rule_based_explanation(&input), "fallback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockChatModel, ProviderError};

    fn input(intent_id: i64, emotion: Emotion) -> ExplainInput<'static> {
        ExplainInput {
            text: "我最近总是失眠",
            reply: "试试睡前放松",
            intent_id,
            intent_description: "睡眠问题",
            emotion,
            lang: "zh",
        }
    }

    #[tokio::test]
    async fn test_disabled_is_empty() {
        let mut chat = MockChatModel::new();
        chat.expect_complete().never();
        let service = ExplainService::new(Some(Arc::new(chat)), false);
        assert_eq!(service.explain(input(GENERAL_INTENT_ID, Emotion::Sad)).await, (String::new(), "disabled"));
    }

    #[test]
    fn test_rule_based() {
        assert_eq!(
            rule_based_explanation(&input(HEALTH_QUESTION_INTENT_ID, Emotion::Anxious)),
            "根据您提到的健康相关内容，我识别出您需要健康建议。检测到您可能有些担心。因此我提供了相关的健康建议来帮助您。"
        );
        assert_eq!(rule_based_explanation(&input(100004, Emotion::Calm)), "检测到您的心情比较平静。");
    }

    #[tokio::test]
    async fn test_model_then_rules() {
        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .withf(|request| request.messages[0].content.contains("识别意图: 睡眠问题"))
            .returning(|_| Ok("因为您提到了失眠".to_string()));
        let service = ExplainService::new(Some(Arc::new(chat)), true);
        assert_eq!(service.explain(input(100004, Emotion::Sad)).await, ("因为您提到了失眠".to_string(), "openai"));

        let mut chat = MockChatModel::new();
        chat.expect_complete().returning(|_| Err(ProviderError::Request("down".to_string())));
        let service = ExplainService::new(Some(Arc::new(chat)), true);
        let (explanation, method) = service.explain(input(GREETING_INTENT_ID, Emotion::Happy)).await;
        assert_eq!(method, "fallback");
        assert!(explanation.contains("检测到您的心情比较愉快"));
    }
}
