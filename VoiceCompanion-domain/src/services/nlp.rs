//! Intent detection and companion replies
//!
//! Intents live in the `nlp` workbook (`Intent` and `Chat` sheets); the page
//! the user is looking at is described by the `page_ui_info` workbook.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use voice_companion_data::config_tables::{ConfigRecord, ConfigTables, ConfigValue};
use voice_companion_data::models::{ConversationMessage, MessageType};

use crate::providers::{ChatMessage, ChatModel, ChatRequest};

pub const GENERAL_INTENT_ID: i64 = 100001;
pub const GREETING_INTENT_ID: i64 = 100002;
pub const HEALTH_QUESTION_INTENT_ID: i64 = 100003;

pub const NLP_DOMAIN: &str = "nlp";
pub const PAGE_UI_DOMAIN: &str = "page_ui_info";

const INTENT_MODEL: &str = "gpt-3.5-turbo";
const REPLY_MODEL: &str = "gpt-4o";
/// Session messages handed to the reply model
pub const HISTORY_LIMIT: usize = 20;

pub const NOT_UNDERSTOOD_REPLY: &str = "很抱歉，我还不太明白你的意思。";
const NAVIGATION_REPLY: &str = "好的，我明白了，马上帮你导航到...";
pub const SERVICE_UNAVAILABLE_REPLY: &str = "抱歉，我现在无法处理您的请求。请稍后再试。";

const COMPANION_SYSTEM_PROMPT: &str = "你是一个温暖、积极探讨的、拥有一定知识的聊天朋友。";

const COMPANION_GUIDELINES: &str = "**Role Definition:**
1. You are a trusted friend and a confidante
2. You are highly skilled in active listening
3. You build a heart-to-heart connection with users
4. You take as much time as needed and encourage users to talk through their emotional woes or share their happiness, events, and experiences
5. You listen to both the tone and the words, including subtexts, and ask clarifying questions to understand their needs
6. You offer a sounding board and a guiding hand in emotion regulation

**Voice Tone:**
- Warm, trusting, caring, affectionate, confident
- Use conversational language

**Guidelines:**
- Do not lecture
- Do not provide generic responses
- Do not cut short the dialogue before guiding users out of their negative mood

**Interaction Flow:**
- Induce users into a dialogue about their mood and what is going on
- Take time in dialogue and do not rush
- Reference previous dialogue and user-specific data so the conversation feels like a talk with a close friend

**After Emotional Support:**
- Once the user is in a positive mood, point them to the dashboard screen
- Highlight 3-4 things: something done well, something to improve, a key reminder
- If the user wants to explore an item further, offer actionable insights rather than reading data line by line

**Guidance Approach:**
- Take the lead in suggesting specific activities to add or things to avoid
- Do not burden the user with unnecessary decisions
- Ask for feedback on suggested activities and adapt future suggestions
";

/// Canned replies available in every supported language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedResponse {
    Greeting,
    HealthAdvice,
    Error,
}

/// Canned reply in `lang`, English for languages without a translation
pub fn localized_response(kind: CannedResponse, lang: &str) -> &'static str {
    let table: &[(&str, &str)] = match kind {
        CannedResponse::Greeting => &[
            ("zh", "你好！我是你的健康AI助手，很高兴为您服务。"),
            ("en", "Hello! I'm your health AI assistant, glad to serve you."),
            ("ja", "こんにちは！私はあなたの健康AIアシスタントです。お手伝いできることを嬉しく思います。"),
            ("ko", "안녕하세요! 저는 당신의 건강 AI 어시스턴트입니다. 도움을 드릴 수 있어서 기쁩니다."),
            ("fr", "Bonjour ! Je suis votre assistant IA de santé, ravi de vous servir."),
            ("de", "Hallo! Ich bin Ihr Gesundheits-KI-Assistent, freue mich, Ihnen zu helfen."),
            ("es", "¡Hola! Soy tu asistente de IA de salud, me alegra ayudarte."),
            ("ru", "Привет! Я ваш ИИ-помощник по здоровью, рад помочь вам."),
            ("ar", "مرحباً! أنا مساعد الذكاء الاصطناعي الصحي الخاص بك، يسعدني خدمتك."),
            ("hi", "नमस्ते! मैं आपका स्वास्थ्य AI सहायक हूं, आपकी सेवा करके खुशी हो रही है।"),
        ],
        CannedResponse::HealthAdvice => &[
            ("zh", "根据您的描述，我建议您注意以下几点："),
            ("en", "Based on your description, I suggest you pay attention to the following:"),
            ("ja", "あなたの説明に基づいて、以下の点に注意することをお勧めします："),
            ("ko", "귀하의 설명에 따라 다음 사항에 주의하시기 바랍니다:"),
            ("fr", "Selon votre description, je vous suggère de prêter attention aux points suivants :"),
            ("de", "Basierend auf Ihrer Beschreibung schlage ich vor, dass Sie auf Folgendes achten:"),
            ("es", "Según su descripción, le sugiero que preste atención a lo siguiente:"),
            ("ru", "Основываясь на вашем описании, я предлагаю обратить внимание на следующее:"),
            ("ar", "بناءً على وصفك، أقترح عليك الانتباه إلى النقاط التالية:"),
            ("hi", "आपके विवरण के आधार पर, मैं सुझाव देता हूं कि आप निम्नलिखित बातों पर ध्यान दें:"),
        ],
        CannedResponse::Error => &[
            ("zh", "抱歉，我暂时无法理解您的请求。请重新表述或尝试其他问题。"),
            ("en", "Sorry, I cannot understand your request at the moment. Please rephrase or try another question."),
            ("ja", "申し訳ございませんが、現在お客様のリクエストを理解できません。言い換えるか、別の質問を試してください。"),
            ("ko", "죄송합니다. 현재 귀하의 요청을 이해할 수 없습니다. 다시 표현하거나 다른 질문을 시도해 주세요."),
            ("fr", "Désolé, je ne peux pas comprendre votre demande pour le moment. Veuillez reformuler ou essayer une autre question."),
            ("de", "Entschuldigung, ich kann Ihre Anfrage derzeit nicht verstehen. Bitte formulieren Sie es anders oder versuchen Sie eine andere Frage."),
            ("es", "Lo siento, no puedo entender su solicitud en este momento. Por favor reformule o intente otra pregunta."),
            ("ru", "Извините, я не могу понять ваш запрос в данный момент. Пожалуйста, переформулируйте или попробуйте другой вопрос."),
            ("ar", "عذراً، لا أستطيع فهم طلبك في الوقت الحالي. يرجى إعادة الصياغة أو تجربة سؤال آخر."),
            ("hi", "क्षमा करें, मैं वर्तमान में आपके अनुरोध को समझ नहीं सकता। कृपया पुनः व्यक्त करें या कोई अन्य प्रश्न आज़माएं।"),
        ],
    };

    table
        .iter()
        .find(|(code, _)| *code == lang)
        .or_else(|| table.iter().find(|(code, _)| *code == "en"))
        .map(|(_, text)| *text)
        .unwrap_or_default()
}

fn greeting_keywords(lang: &str) -> &'static [&'static str] {
    match lang {
        "zh" => &["你好", "您好", "早上好", "下午好", "晚上好", "嗨"],
        "en" => &["hello", "hi", "good morning", "good afternoon", "good evening", "hey"],
        "ja" => &["こんにちは", "おはよう", "こんばんは", "はじめまして"],
        "ko" => &["안녕하세요", "안녕", "좋은 아침", "좋은 저녁"],
        "fr" => &["bonjour", "salut", "bonsoir", "coucou"],
        "de" => &["hallo", "guten tag", "guten morgen", "guten abend"],
        "es" => &["hola", "buenos días", "buenas tardes", "buenas noches"],
        "ru" => &["привет", "здравствуйте", "доброе утро", "добрый вечер"],
        "ar" => &["مرحبا", "أهلا", "صباح الخير", "مساء الخير"],
        "hi" => &["नमस्ते", "हैलो", "सुप्रभात", "शुभ संध्या"],
        _ => &[],
    }
}

fn health_keywords(lang: &str) -> &'static [&'static str] {
    match lang {
        "zh" => &["健康", "身体", "症状", "疾病", "治疗", "医生", "医院"],
        "en" => &["health", "body", "symptom", "disease", "treatment", "doctor", "hospital"],
        "ja" => &["健康", "体", "症状", "病気", "治療", "医者", "病院"],
        "ko" => &["건강", "몸", "증상", "질병", "치료", "의사", "병원"],
        "fr" => &["santé", "corps", "symptôme", "maladie", "traitement", "médecin", "hôpital"],
        "de" => &["gesundheit", "körper", "symptom", "krankheit", "behandlung", "arzt", "krankenhaus"],
        "es" => &["salud", "cuerpo", "síntoma", "enfermedad", "tratamiento", "médico", "hospital"],
        "ru" => &["здоровье", "тело", "симптом", "болезнь", "лечение", "врач", "больница"],
        "ar" => &["صحة", "جسم", "عرض", "مرض", "علاج", "طبيب", "مستشفى"],
        "hi" => &["स्वास्थ्य", "शरीर", "लक्षण", "बीमारी", "उपचार", "डॉक्टर", "अस्पताल"],
        _ => &[],
    }
}

/// Built-in greeting and health keywords for `lang`
pub fn multilingual_intent(text: &str, lang: &str) -> Option<(i64, f64)> {
    let lowered = text.to_lowercase();
    if greeting_keywords(lang).iter().any(|k| lowered.contains(k)) {
        return Some((GREETING_INTENT_ID, 0.8));
    }
    if health_keywords(lang).iter().any(|k| lowered.contains(k)) {
        return Some((HEALTH_QUESTION_INTENT_ID, 0.8));
    }
    None
}

fn text_field(record: &ConfigRecord, column: &str) -> String {
    record.get(column).map(ToString::to_string).unwrap_or_default()
}

/// A list cell item by item, a text cell split on commas
fn split_list(value: Option<&ConfigValue>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(ConfigValue::List(items)) => items.iter().map(ToString::to_string).collect(),
        Some(ConfigValue::Json(Value::Array(items))) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect(),
        Some(value) if !value.is_null() => value.to_string().split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Deserialize)]
struct IntentAnswer {
    intent: Value,
    confidence: f64,
}

/// Outcome of one understanding round
#[derive(Debug, Clone, PartialEq)]
pub struct NlpOutcome {
    pub reply: String,
    pub intent_id: i64,
    pub confidence: f64,
}

pub struct NlpService {
    config: Arc<ConfigTables>,
    chat: Option<Arc<dyn ChatModel>>,
}

impl NlpService {
    pub fn new(config: Arc<ConfigTables>, chat: Option<Arc<dyn ChatModel>>) -> Self {
        Self { config, chat }
    }

    /// Pick up edits to the intent and page workbooks before reading the cached sheets
    pub async fn refresh(&self) {
        Arc::clone(&self.config).refresh(NLP_DOMAIN).await;
        Arc::clone(&self.config).refresh(PAGE_UI_DOMAIN).await;
    }

    /// Intent and reply for one utterance
    pub async fn process(
        &self,
        text: &str,
        lang: &str,
        history: &[ConversationMessage],
        current_route: Option<&str>,
    ) -> NlpOutcome {
        self.refresh().await;
        let (intent_id, confidence) = self.detect_intent(text, lang).await;
        let reply = self.generate_reply(intent_id, text, lang, history, current_route).await;
        NlpOutcome { reply, intent_id, confidence }
    }

    /// The model first, then built-in multilingual keywords, then the workbook keywords
    pub async fn detect_intent(&self, text: &str, lang: &str) -> (i64, f64) {
        if let Some(detected) = self.detect_intent_with_model(text, lang).await {
            return detected;
        }
        if let Some(detected) = multilingual_intent(text, lang) {
            return detected;
        }
        self.detect_intent_with_keywords(text)
    }

    async fn detect_intent_with_model(&self, text: &str, lang: &str) -> Option<(i64, f64)> {
        let chat = self.chat.as_ref()?;
        let intents = self.config.cached_sheet(NLP_DOMAIN, "Intent").unwrap_or_default();

        let mut prompt = String::from("分析以下文本的意图，从以下选项中选择（选数字ID）：\n");
        for (id, record) in &intents {
            prompt.push_str(&format!(
                "- {}: {}, 参考关键词：{}\n",
                id,
                text_field(record, "Name"),
                text_field(record, "Keywords")
            ));
        }
        prompt.push_str(&format!(
            "文本: {}\n语言: {}\n请返回JSON格式: {{\"intent\": 意图ID, \"confidence\": 置信度（0-1）}}",
            text, lang
        ));

        let request = ChatRequest::new(INTENT_MODEL, vec![ChatMessage::user(prompt)], 1000);
        let answer = match chat.complete(request).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("OpenAI intent detection failed: {}", e);
                return None;
            }
        };

        let parsed: IntentAnswer = match serde_json::from_str(&answer) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparsable intent answer {:?}: {}", answer, e);
                return None;
            }
        };
        let intent_id = match &parsed.intent {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        Some((intent_id, parsed.confidence.clamp(0.0, 1.0)))
    }

    /// First configured intent with a keyword in the text
    pub fn detect_intent_with_keywords(&self, text: &str) -> (i64, f64) {
        let lowered = text.to_lowercase();
        let intents = self.config.cached_sheet(NLP_DOMAIN, "Intent").unwrap_or_default();

        for (id, record) in &intents {
            let keywords = split_list(record.get("Keywords"));
            let matches = keywords
                .iter()
                .filter(|k| lowered.contains(&k.to_lowercase()))
                .count();
            if matches > 0 {
                if let Ok(intent_id) = id.parse::<i64>() {
                    return (intent_id, (0.5 + 0.1 * matches as f64).min(0.9));
                }
            }
        }
        (GENERAL_INTENT_ID, 0.5)
    }

    /// Description column of an intent
    pub fn intent_description(&self, intent_id: i64) -> Option<String> {
        self.config
            .cached_value(NLP_DOMAIN, "Intent", &intent_id.to_string())
            .map(|record| text_field(&record, "Description"))
            .filter(|d| !d.is_empty())
    }

    /// Workbook template for an intent, used as is when the model is unavailable
    pub fn template_reply(&self, intent_id: i64) -> String {
        let Some(intent) = self.config.cached_value(NLP_DOMAIN, "Intent", &intent_id.to_string()) else {
            warn!(intent_id, "No configuration for intent");
            return NOT_UNDERSTOOD_REPLY.to_string();
        };

        // the column really is spelled Catagory in the workbooks
        if text_field(&intent, "Catagory") != "chat" {
            return NAVIGATION_REPLY.to_string();
        }

        let templates: Vec<String> = self
            .config
            .cached_value(NLP_DOMAIN, "Chat", &intent_id.to_string())
            .map(|chat| match chat.get("Template") {
                Some(ConfigValue::List(items)) => items.iter().map(ToString::to_string).collect(),
                Some(value) => value.to_string().lines().map(str::to_string).collect(),
                None => Vec::new(),
            })
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        templates
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| NOT_UNDERSTOOD_REPLY.to_string())
    }

    /// Companion reply from the model, grounded in history and the current page
    pub async fn generate_reply(
        &self,
        intent_id: i64,
        input: &str,
        lang: &str,
        history: &[ConversationMessage],
        current_route: Option<&str>,
    ) -> String {
        let template = self.template_reply(intent_id);
        let Some(chat) = &self.chat else {
            return template;
        };

        let mut user_prompt = format!("用户说：{}\n**回答语言：{}**\n", input, lang);
        if let Some(route) = current_route.filter(|r| !r.is_empty()) {
            let context = self.page_context(route);
            debug!(%route, "Using page context for reply");
            user_prompt.push_str(&format!("**当前用户所在页面信息：**\n{}\n", context));
        }
        user_prompt.push_str(COMPANION_GUIDELINES);

        let skip = history.len().saturating_sub(HISTORY_LIMIT);
        let mut messages = vec![ChatMessage::system(COMPANION_SYSTEM_PROMPT)];
        messages.extend(history.iter().skip(skip).map(|m| match m.message_type {
            MessageType::User => ChatMessage::user(m.content.clone()),
            MessageType::Ai => ChatMessage::assistant(m.content.clone()),
        }));
        messages.push(ChatMessage::user(user_prompt));

        match chat.complete(ChatRequest::new(REPLY_MODEL, messages, 1000)).await {
            Ok(reply) if !reply.is_empty() => {
                info!(intent_id, history = history.len(), "Generated companion reply");
                reply
            }
            Ok(_) => template,
            Err(e) => {
                warn!("Reply generation failed, using template: {}", e);
                template
            }
        }
    }

    /// Plain-text description of a page, its components and actions
    pub fn page_context(&self, route: &str) -> String {
        let Some(page) = self.config.cached_value(PAGE_UI_DOMAIN, "pages", route) else {
            return format!("用户当前在页面: {}", route);
        };

        let name = Some(text_field(&page, "page_name"))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "未知页面".to_string());
        let mut head = format!("用户当前在页面: {} ({})", name, route);
        let tags = split_list(page.get("tags"));
        if !tags.is_empty() {
            head.push_str(&format!("，标签: {}", tags.join(" / ")));
        }
        let statistics = text_field(&page, "statistics");
        if !statistics.is_empty() {
            head.push_str(&format!("，统计数据: {}", statistics));
        }

        let mut lines = vec![head];
        let description = text_field(&page, "description");
        if !description.is_empty() {
            lines.push(format!("页面描述: {}", description));
        }

        let components = self.component_lines(route);
        if !components.is_empty() {
            lines.push("页面UI组件:".to_string());
            lines.extend(components.into_iter().take(30));
        }
        let actions = self.action_lines(route);
        if !actions.is_empty() {
            lines.push("页面可执行操作:".to_string());
            lines.extend(actions.into_iter().take(20));
        }
        lines.join("\n")
    }

    fn component_lines(&self, route: &str) -> Vec<String> {
        let sheet = self.config.cached_sheet(PAGE_UI_DOMAIN, "components").unwrap_or_default();
        sheet
            .iter()
            .filter(|(_, record)| text_field(record, "route") == route)
            .map(|(id, record)| {
                let name = Some(text_field(record, "name")).filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone());
                let mut meta = Vec::new();
                let kind = text_field(record, "type");
                if !kind.is_empty() {
                    meta.push(format!("类型:{}", kind));
                }
                let display = text_field(record, "display");
                if !display.is_empty() {
                    meta.push(format!("内容:{}", display));
                }
                let fields = split_list(record.get("related_fields"));
                if !fields.is_empty() {
                    meta.push(format!("字段:{}", fields.join(" / ")));
                }

                let mut line = format!("- {}", name);
                let description = text_field(record, "description");
                if !description.is_empty() {
                    line.push_str(&format!("：{}", description));
                }
                if !meta.is_empty() {
                    line.push_str(&format!("（{}）", meta.join("，")));
                }
                line
            })
            .collect()
    }

    fn action_lines(&self, route: &str) -> Vec<String> {
        let sheet = self.config.cached_sheet(PAGE_UI_DOMAIN, "actions").unwrap_or_default();
        sheet
            .iter()
            .filter(|(_, record)| text_field(record, "route") == route)
            .map(|(id, record)| {
                let name = Some(text_field(record, "name")).filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone());
                let mut meta = Vec::new();
                let kind = text_field(record, "type");
                if !kind.is_empty() {
                    meta.push(format!("类型:{}", kind));
                }
                let trigger = text_field(record, "trigger");
                if !trigger.is_empty() {
                    meta.push(format!("触发:{}", trigger));
                }
                let related = split_list(record.get("related"));
                if !related.is_empty() {
                    meta.push(format!("涉及:{}", related.join(" / ")));
                }

                let mut line = format!("- {}", name);
                let result = text_field(record, "result");
                if !result.is_empty() {
                    line.push_str(&format!(" → {}", result));
                }
                if !meta.is_empty() {
                    line.push_str(&format!("（{}）", meta.join("，")));
                }
                line
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockChatModel, ProviderError};
    use crate::testing::sample_config_tables;
    use chrono::Utc;

    fn service(chat: Option<MockChatModel>) -> NlpService {
        NlpService::new(sample_config_tables(), chat.map(|c| Arc::new(c) as Arc<dyn ChatModel>))
    }

    fn message(message_type: MessageType, content: &str) -> ConversationMessage {
        ConversationMessage {
            id: 0,
            session_id: "s".to_string(),
            message_type,
            content: content.to_string(),
            timestamp: Utc::now(),
            intent_id: None,
            confidence: None,
            emotion: None,
            language: None,
            processing_time: None,
            metadata: None,
        }
    }

    #[test]
    fn test_localized_responses() {
        assert_eq!(localized_response(CannedResponse::Greeting, "fr"), "Bonjour ! Je suis votre assistant IA de santé, ravi de vous servir.");
        assert_eq!(
            localized_response(CannedResponse::Error, "pt"),
            localized_response(CannedResponse::Error, "en")
        );
    }

    #[test]
    fn test_multilingual_keywords() {
        assert_eq!(multilingual_intent("Hello there", "en"), Some((GREETING_INTENT_ID, 0.8)));
        assert_eq!(multilingual_intent("Мне нужен врач", "ru"), Some((HEALTH_QUESTION_INTENT_ID, 0.8)));
        assert_eq!(multilingual_intent("random words", "xx"), None);
    }

    #[tokio::test]
    async fn test_detect_intent_without_model() {
        let nlp = service(None);
        assert_eq!(nlp.detect_intent("你好呀", "zh").await, (GREETING_INTENT_ID, 0.8));
        // workbook keywords: 睡眠 and 失眠 both match intent 100004
        let (intent, confidence) = nlp.detect_intent("最近睡眠不好，经常失眠", "zh").await;
        assert_eq!(intent, 100004);
        assert!((confidence - 0.7).abs() < 1e-9);
        assert_eq!(nlp.detect_intent("随便聊聊", "zh").await, (GENERAL_INTENT_ID, 0.5));
    }

    #[tokio::test]
    async fn test_detect_intent_with_model() {
        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .withf(|request| request.model == "gpt-3.5-turbo" && request.messages[0].content.contains("- 100002: 问候"))
            .returning(|_| Ok(r#"{"intent": "100003", "confidence": 0.92}"#.to_string()));
        assert_eq!(service(Some(chat)).detect_intent("hi", "en").await, (HEALTH_QUESTION_INTENT_ID, 0.92));

        let mut chat = MockChatModel::new();
        chat.expect_complete().returning(|_| Ok("not json".to_string()));
        assert_eq!(service(Some(chat)).detect_intent("hello", "en").await, (GREETING_INTENT_ID, 0.8));
    }

    #[test]
    fn test_template_reply() {
        let nlp = service(None);
        assert_eq!(nlp.template_reply(999), NOT_UNDERSTOOD_REPLY);
        assert_eq!(nlp.template_reply(100005), NAVIGATION_REPLY);
        let greeting = nlp.template_reply(GREETING_INTENT_ID);
        assert!(greeting == "你好呀！" || greeting == "很高兴见到你！", "unexpected template {}", greeting);
        assert_eq!(nlp.intent_description(GREETING_INTENT_ID).as_deref(), Some("用户打招呼"));
    }

    #[tokio::test]
    async fn test_reply_prompt_carries_history_and_page() {
        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .withf(|request| {
                let last = &request.messages[request.messages.len() - 1].content;
                request.model == "gpt-4o"
                    && request.messages.len() == 4
                    && request.messages[1].role == "user"
                    && request.messages[2].role == "assistant"
                    && last.starts_with("用户说：今天怎么样\n**回答语言：zh**")
                    && last.contains("用户当前在页面: 健康数据 (/health)")
            })
            .returning(|_| Ok("挺好的".to_string()));

        let history = vec![message(MessageType::User, "你好"), message(MessageType::Ai, "你好呀")];
        let reply = service(Some(chat))
            .generate_reply(GREETING_INTENT_ID, "今天怎么样", "zh", &history, Some("/health"))
            .await;
        assert_eq!(reply, "挺好的");
    }

    #[tokio::test]
    async fn test_reply_falls_back_to_template() {
        let mut chat = MockChatModel::new();
        chat.expect_complete().returning(|_| Err(ProviderError::Request("down".to_string())));
        let reply = service(Some(chat)).generate_reply(100005, "去设置", "zh", &[], None).await;
        assert_eq!(reply, NAVIGATION_REPLY);
    }

    #[test]
    fn test_page_context() {
        let nlp = service(None);
        let context = nlp.page_context("/health");
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines[0], "用户当前在页面: 健康数据 (/health)，标签: 运动 / 睡眠，统计数据: 每日汇总");
        assert_eq!(lines[1], "页面描述: 展示步数与睡眠");
        assert_eq!(lines[2], "页面UI组件:");
        assert_eq!(lines[3], "- 步数卡片：今日步数（类型:card，字段:steps / goal）");
        assert_eq!(lines[4], "页面可执行操作:");
        assert_eq!(lines[5], "- 同步数据 → 刷新卡片（类型:button，触发:点击）");
        assert_eq!(lines.len(), 6);

        assert_eq!(nlp.page_context("/unknown"), "用户当前在页面: /unknown");
    }
}
