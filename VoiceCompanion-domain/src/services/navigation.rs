//! Voice navigation: map an utterance to an app page or action
//!
//! Pages and actions come from the `navigation` workbook (`Pages` and
//! `Actions` sheets) and are read on every call, so workbook edits apply
//! without a restart.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use voice_companion_data::config_tables::{ConfigRecord, ConfigSheet, ConfigTables, ConfigValue};

use crate::providers::{ChatMessage, ChatModel, ChatRequest};

pub const NAVIGATION_DOMAIN: &str = "navigation";
const PAGES_SHEET: &str = "Pages";
const ACTIONS_SHEET: &str = "Actions";

/// Keyword matches must score above this
const KEYWORD_THRESHOLD: f64 = 0.3;
/// Model answers below this confidence defer to keyword matching
const MODEL_THRESHOLD: f64 = 0.7;

/// Navigation decision sent to the client
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationResult {
    PageNavigation {
        action: String,
        target: String,
        route: String,
        screen_class: String,
        name: String,
        confidence: f64,
        message: String,
    },
    Action {
        action: String,
        #[schema(value_type = Object)]
        parameters: Value,
        name: String,
        confidence: f64,
        message: String,
    },
    None {
        action: Option<String>,
        confidence: f64,
        message: String,
    },
}

impl NavigationResult {
    pub fn none() -> Self {
        Self::none_with_message("未识别到导航意图")
    }

    pub fn none_with_message(message: &str) -> Self {
        NavigationResult::None { action: None, confidence: 0.0, message: message.to_string() }
    }

    fn page(target: &str, record: &ConfigRecord, confidence: f64) -> Self {
        let name = text_field(record, "Name");
        NavigationResult::PageNavigation {
            action: "navigate".to_string(),
            target: target.to_string(),
            route: text_field(record, "Route"),
            screen_class: text_field(record, "ScreenClass"),
            message: format!("正在为您导航到{}", name),
            name,
            confidence,
        }
    }

    fn action(record: &ConfigRecord, confidence: f64) -> Self {
        let name = text_field(record, "Name");
        NavigationResult::Action {
            action: text_field(record, "Action"),
            parameters: record
                .get("Parameters")
                .filter(|v| !v.is_null())
                .map(ConfigValue::to_json)
                .unwrap_or_else(|| Value::Object(Default::default())),
            message: format!("正在执行{}操作", name),
            name,
            confidence,
        }
    }

    pub fn route(&self) -> Option<&str> {
        match self {
            NavigationResult::PageNavigation { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            NavigationResult::PageNavigation { confidence, .. }
            | NavigationResult::Action { confidence, .. }
            | NavigationResult::None { confidence, .. } => *confidence,
        }
    }
}

/// Page entry as listed to clients
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PageInfo {
    pub id: String,
    pub name: String,
    pub route: String,
    pub screen_class: String,
    pub description: String,
    pub icon: String,
    pub category: String,
}

impl PageInfo {
    fn from_record(id: &str, record: &ConfigRecord) -> Self {
        Self {
            id: id.to_string(),
            name: text_field(record, "Name"),
            route: text_field(record, "Route"),
            screen_class: text_field(record, "ScreenClass"),
            description: text_field(record, "Description"),
            icon: text_field(record, "Icon"),
            category: text_field(record, "Category"),
        }
    }
}

fn text_field(record: &ConfigRecord, column: &str) -> String {
    record.get(column).map(ToString::to_string).unwrap_or_default()
}

/// Comma separated keywords; list cells are taken item by item
fn keywords(record: &ConfigRecord) -> Vec<String> {
    match record.get("Keywords") {
        Some(ConfigValue::List(items)) => items.iter().map(|item| item.to_string().trim().to_string()).collect(),
        Some(value) => value.to_string().split(',').map(|k| k.trim().to_string()).collect(),
        None => Vec::new(),
    }
    .into_iter()
    .filter(|k| !k.is_empty())
    .collect()
}

/// Best keyword score of one entry against lowercased text
fn score_entry(record: &ConfigRecord, lowered: &str, text_len: f64) -> f64 {
    let mut best: f64 = 0.0;
    let name = text_field(record, "Name");
    if !name.is_empty() && lowered.contains(&name.to_lowercase()) {
        best = best.max(name.chars().count() as f64 / text_len * 1.5);
    }
    for keyword in keywords(record) {
        if lowered.contains(&keyword.to_lowercase()) {
            best = best.max(keyword.chars().count() as f64 / text_len);
        }
    }
    best
}

/// Highest scoring entry of a sheet above the threshold; the first one wins ties
fn best_match<'a>(sheet: &'a ConfigSheet, text: &str) -> Option<(&'a String, &'a ConfigRecord, f64)> {
    let text_len = text.chars().count();
    if text_len == 0 {
        return None;
    }
    let lowered = text.to_lowercase();

    let mut best: Option<(&String, &ConfigRecord, f64)> = None;
    for (id, record) in sheet {
        let score = score_entry(record, &lowered, text_len as f64);
        if score > best.map_or(0.0, |(_, _, top)| top) {
            best = Some((id, record, score));
        }
    }
    best.filter(|(_, _, score)| *score > KEYWORD_THRESHOLD)
}

#[derive(Debug, Deserialize)]
struct ModelAnswer {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    target: Option<Value>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

pub struct NavigationService {
    config: Arc<ConfigTables>,
    chat: Option<Arc<dyn ChatModel>>,
}

impl NavigationService {
    pub fn new(config: Arc<ConfigTables>, chat: Option<Arc<dyn ChatModel>>) -> Self {
        Self { config, chat }
    }

    /// Pick up workbook edits before reading the cached sheets
    async fn refresh(&self) {
        Arc::clone(&self.config).refresh(NAVIGATION_DOMAIN).await;
    }

    fn pages(&self) -> ConfigSheet {
        self.config.cached_sheet(NAVIGATION_DOMAIN, PAGES_SHEET).unwrap_or_default()
    }

    fn actions(&self) -> ConfigSheet {
        self.config.cached_sheet(NAVIGATION_DOMAIN, ACTIONS_SHEET).unwrap_or_default()
    }

    /// Navigation intent of `text` and the method that decided it (`openai` or `fallback`)
    pub async fn detect(&self, text: &str, lang: &str) -> (NavigationResult, &'static str) {
        self.refresh().await;
        let pages = self.pages();
        let actions = self.actions();

        if let Some(result) = self.detect_with_model(text, &pages, &actions).await {
            if result.confidence() > MODEL_THRESHOLD {
                return (result, "openai");
            }
        }

        debug!(%lang, "Falling back to keyword navigation matching");
        (detect_with_keywords(text, &pages, &actions), "fallback")
    }

    async fn detect_with_model(
        &self,
        text: &str,
        pages: &ConfigSheet,
        actions: &ConfigSheet,
    ) -> Option<NavigationResult> {
        let chat = self.chat.as_ref()?;

        let pages_info: Vec<Value> = pages
            .iter()
            .map(|(id, record)| {
                serde_json::json!({
                    "id": id,
                    "name": text_field(record, "Name"),
                    "route": text_field(record, "Route"),
                    "screen_class": text_field(record, "ScreenClass"),
                    "keywords": text_field(record, "Keywords"),
                    "description": text_field(record, "Description"),
                })
            })
            .collect();
        let actions_info: Vec<Value> = actions
            .iter()
            .map(|(id, record)| {
                serde_json::json!({
                    "id": id,
                    "name": text_field(record, "Name"),
                    "action": text_field(record, "Action"),
                    "keywords": text_field(record, "Keywords"),
                    "description": text_field(record, "Description"),
                })
            })
            .collect();

        let system_prompt = format!(
            "你是一个导航意图识别助手。根据用户输入，判断用户想要导航到哪个页面或执行什么动作。一般来说，当用户说“我要转到...“，\"跳转到...“，\"我要看...“等命令语句以及“页面”，“界面”等词语时置信度应当很高。\n\n可用页面：\n{}\n\n可用动作：\n{}\n\n请分析用户输入，返回JSON格式的导航结果：\n- 如果是页面导航，返回：{{\"type\": \"page_navigation\", \"target\": 页面ID, \"confidence\": 置信度0-1}}\n- 如果是动作执行，返回：{{\"type\": \"action\", \"action\": \"动作名称\", \"confidence\": 置信度0-1}}\n- 如果无导航意图，返回：{{\"type\": \"none\", \"confidence\": 0}}\n\n只返回JSON，不要其他内容。",
            serde_json::to_string_pretty(&pages_info).unwrap_or_default(),
            serde_json::to_string_pretty(&actions_info).unwrap_or_default(),
        );
        let request = ChatRequest::new(
            "gpt-3.5-turbo",
            vec![ChatMessage::system(system_prompt), ChatMessage::user(text)],
            200,
        );

        let answer = match chat.complete(request).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("OpenAI navigation detection failed: {}", e);
                return None;
            }
        };
        let parsed: ModelAnswer = match serde_json::from_str(&answer) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparsable navigation answer {:?}: {}", answer, e);
                return None;
            }
        };

        let confidence = parsed.confidence.unwrap_or(0.8);
        match parsed.kind.as_str() {
            "page_navigation" => {
                let target = match parsed.target? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                pages.get(&target).map(|record| NavigationResult::page(&target, record, confidence))
            }
            "action" => {
                let action = parsed.action?;
                actions
                    .values()
                    .find(|record| text_field(record, "Action") == action)
                    .map(|record| NavigationResult::action(record, confidence))
            }
            "none" => Some(NavigationResult::none()),
            _ => None,
        }
    }

    pub async fn get_available_pages(&self) -> Vec<PageInfo> {
        self.refresh().await;
        self.pages()
            .iter()
            .map(|(id, record)| PageInfo::from_record(id, record))
            .collect()
    }

    pub async fn get_page_by_route(&self, route: &str) -> Option<PageInfo> {
        self.refresh().await;
        self.pages()
            .iter()
            .find(|(_, record)| text_field(record, "Route") == route)
            .map(|(id, record)| PageInfo::from_record(id, record))
    }

    /// Reload the navigation workbook; false when it is unavailable
    pub async fn reload(&self) -> bool {
        let loaded = Arc::clone(&self.config).refresh(NAVIGATION_DOMAIN).await;
        info!(loaded, "Navigation configuration reloaded");
        loaded
    }
}

/// Keyword scoring over pages first, then actions
pub fn detect_with_keywords(text: &str, pages: &ConfigSheet, actions: &ConfigSheet) -> NavigationResult {
    if let Some((id, record, score)) = best_match(pages, text) {
        return NavigationResult::page(id, record, score.min(1.0));
    }
    if let Some((_, record, score)) = best_match(actions, text) {
        return NavigationResult::action(record, score.min(1.0));
    }
    NavigationResult::none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockChatModel, ProviderError};
    use crate::testing::{sample_config_tables, sample_workbooks};
    use voice_companion_data::config_tables::RawSheet;

    fn service(chat: Option<MockChatModel>) -> NavigationService {
        NavigationService::new(
            sample_config_tables(),
            chat.map(|c| Arc::new(c) as Arc<dyn ChatModel>),
        )
    }

    #[tokio::test]
    async fn test_keyword_page_match() {
        let (result, method) = service(None).detect("看健康数据", "zh").await;
        assert_eq!(method, "fallback");
        match result {
            NavigationResult::PageNavigation { target, route, name, confidence, message, .. } => {
                assert_eq!(target, "health");
                assert_eq!(route, "/health");
                assert_eq!(name, "健康数据");
                assert_eq!(confidence, 1.0);
                assert_eq!(message, "正在为您导航到健康数据");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keyword_action_match() {
        let (result, _) = service(None).detect("帮我刷新", "zh").await;
        match result {
            NavigationResult::Action { action, parameters, message, .. } => {
                assert_eq!(action, "refresh");
                assert_eq!(parameters["force"], true);
                assert_eq!(message, "正在执行刷新页面操作");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_weak_match_is_none() {
        // "设置" scores 2/15, below the threshold
        let (result, _) = service(None).detect("今天天气怎么样我想出去走走设置", "zh").await;
        assert_eq!(result, NavigationResult::none());

        let json = serde_json::to_value(NavigationResult::none()).unwrap();
        assert_eq!(json["type"], "none");
        assert!(json["action"].is_null());
        assert_eq!(json["message"], "未识别到导航意图");
    }

    #[tokio::test]
    async fn test_model_answer_used_when_confident() {
        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .returning(|_| Ok(r#"{"type": "page_navigation", "target": "settings", "confidence": 0.9}"#.to_string()));
        let (result, method) = service(Some(chat)).detect("I want to change my options", "en").await;
        assert_eq!(method, "openai");
        assert_eq!(result.route(), Some("/settings"));
    }

    #[tokio::test]
    async fn test_low_confidence_model_answer_defers_to_keywords() {
        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .returning(|_| Ok(r#"{"type": "page_navigation", "target": "settings", "confidence": 0.5}"#.to_string()));
        let (result, method) = service(Some(chat)).detect("健康数据", "zh").await;
        assert_eq!(method, "fallback");
        assert_eq!(result.route(), Some("/health"));

        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .returning(|_| Err(ProviderError::Request("down".to_string())));
        let (_, method) = service(Some(chat)).detect("健康数据", "zh").await;
        assert_eq!(method, "fallback");
    }

    #[tokio::test]
    async fn test_pages_listing() {
        let service = service(None);
        let pages = service.get_available_pages().await;
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, "health");
        assert_eq!(pages[0].icon, "heart");

        assert_eq!(service.get_page_by_route("/settings").await.unwrap().name, "设置");
        assert!(service.get_page_by_route("/missing").await.is_none());
        assert!(service.reload().await);
    }

    #[tokio::test]
    async fn test_workbook_edit_seen_by_next_lookup() {
        let books = sample_workbooks();
        let tables = Arc::new(ConfigTables::new(books.clone()));
        let service = NavigationService::new(tables, None);
        assert_eq!(service.get_available_pages().await.len(), 2);

        books.insert(
            NAVIGATION_DOMAIN,
            vec![RawSheet::from_text(
                "Pages",
                &[
                    &["ID", "Name", "Route", "Keywords"],
                    &["page id", "display name", "route", "comma separated"],
                    &["string", "string", "string", "string"],
                    &["profile", "个人资料", "/profile", "资料,个人"],
                ],
            )],
        );

        let pages = service.get_available_pages().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].route, "/profile");
    }
}
