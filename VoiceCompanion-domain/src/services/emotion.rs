//! Text emotion analysis: OpenAI, Azure sentiment, then keyword rules

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::providers::{ChatMessage, ChatModel, ChatRequest, SentimentAnalyzer};

/// The six emotion labels, serialized by their Chinese label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Anxious,
    Calm,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Anxious,
        Emotion::Calm,
        Emotion::Neutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Happy => "开心",
            Emotion::Sad => "悲伤",
            Emotion::Angry => "愤怒",
            Emotion::Anxious => "焦虑",
            Emotion::Calm => "平静",
            Emotion::Neutral => "中性",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.label() == label.trim())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Emotion::Happy => "愉快、兴奋的情感",
            Emotion::Sad => "难过、沮丧的情感",
            Emotion::Angry => "生气、恼火的情感",
            Emotion::Anxious => "担心、紧张的情感",
            Emotion::Calm => "冷静、放松的情感",
            Emotion::Neutral => "正常、平和的情感",
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Emotion::Happy => &["继续保持积极的心态", "与朋友分享您的快乐", "记录下这个美好的时刻"],
            Emotion::Sad => &[
                "允许自己感受这种情绪",
                "与信任的人倾诉",
                "尝试一些放松的活动",
                "如果持续感到悲伤，考虑寻求专业帮助",
            ],
            Emotion::Angry => &[
                "深呼吸，给自己一些时间冷静",
                "尝试运动来释放压力",
                "避免在愤怒时做重要决定",
                "学习情绪管理技巧",
            ],
            Emotion::Anxious => &[
                "尝试深呼吸或冥想",
                "列出您担心的事情",
                "专注于当下，不要过度担心未来",
                "如果焦虑持续，考虑寻求专业帮助",
            ],
            Emotion::Calm => &["保持这种平和的状态", "享受当下的宁静", "可以尝试冥想或瑜伽"],
            Emotion::Neutral => &["保持当前的状态", "可以尝试一些新的活动来丰富生活"],
        }
    }

    /// Keywords for this emotion in `lang`; `None` when the language has no table
    fn keywords(&self, lang: &str) -> Option<&'static [&'static str]> {
        let table: &'static [&'static str] = match (self, lang) {
            (Emotion::Happy, "zh") => &["开心", "快乐", "高兴", "愉快", "兴奋", "喜悦", "欢乐", "爽", "棒", "好"],
            (Emotion::Happy, "en") => &["happy", "joy", "excited", "pleased", "delighted", "cheerful", "glad", "great", "wonderful"],
            (Emotion::Happy, "ja") => &["嬉しい", "楽しい", "幸せ", "喜び", "興奮", "愉快", "爽快", "素晴らしい"],
            (Emotion::Happy, "ko") => &["행복", "기쁨", "즐거움", "신남", "기쁘다", "좋다", "훌륭하다"],
            (Emotion::Happy, "fr") => &["heureux", "joyeux", "content", "ravi", "excitant", "merveilleux"],
            (Emotion::Happy, "de") => &["glücklich", "froh", "freudig", "begeistert", "wunderbar"],
            (Emotion::Happy, "es") => &["feliz", "alegre", "contento", "emocionado", "maravilloso"],
            (Emotion::Happy, "ru") => &["счастливый", "радостный", "довольный", "восторженный"],
            (Emotion::Happy, "ar") => &["سعيد", "مبتهج", "مسرور", "متحمس", "رائع"],
            (Emotion::Happy, "hi") => &["खुश", "आनंदित", "प्रसन्न", "उत्साहित", "शानदार"],

            (Emotion::Sad, "zh") => &["悲伤", "难过", "伤心", "痛苦", "沮丧", "失望", "绝望", "哭", "泪"],
            (Emotion::Sad, "en") => &["sad", "sorrow", "grief", "pain", "depressed", "disappointed", "desperate", "cry", "tears"],
            (Emotion::Sad, "ja") => &["悲しい", "哀しい", "苦しい", "落ち込む", "失望", "絶望", "泣く", "涙"],
            (Emotion::Sad, "ko") => &["슬픔", "고통", "우울", "실망", "절망", "울다", "눈물"],
            (Emotion::Sad, "fr") => &["triste", "douleur", "déprimé", "désappointé", "désespéré", "pleurer"],
            (Emotion::Sad, "de") => &["traurig", "schmerz", "deprimiert", "enttäuscht", "verzweifelt", "weinen"],
            (Emotion::Sad, "es") => &["triste", "dolor", "deprimido", "decepcionado", "desesperado", "llorar"],
            (Emotion::Sad, "ru") => &["грустный", "боль", "подавленный", "разочарованный", "отчаянный"],
            (Emotion::Sad, "ar") => &["حزين", "ألم", "مكتئب", "خائب", "يائس", "يبكي"],
            (Emotion::Sad, "hi") => &["दुखी", "दर्द", "उदास", "निराश", "हताश", "रोना"],

            (Emotion::Angry, "zh") => &["愤怒", "生气", "恼火", "暴躁", "烦躁", "不满", "恨", "讨厌"],
            (Emotion::Angry, "en") => &["angry", "mad", "furious", "irritated", "annoyed", "hate", "dislike"],
            (Emotion::Angry, "ja") => &["怒る", "腹立つ", "イライラ", "嫌い", "憎い"],
            (Emotion::Angry, "ko") => &["화나다", "분노", "짜증", "싫다", "미워하다"],
            (Emotion::Angry, "fr") => &["fâché", "furieux", "irrité", "agacé", "détester"],
            (Emotion::Angry, "de") => &["wütend", "verärgert", "gereizt", "hassen", "verabscheuen"],
            (Emotion::Angry, "es") => &["enojado", "furioso", "irritado", "molesto", "odiar"],
            (Emotion::Angry, "ru") => &["злой", "сердитый", "раздраженный", "ненавидеть"],
            (Emotion::Angry, "ar") => &["غاضب", "غضبان", "منزعج", "يكره", "مكروه"],
            (Emotion::Angry, "hi") => &["गुस्सा", "क्रोधित", "चिढ़ा हुआ", "नफरत", "घृणा"],

            (Emotion::Anxious, "zh") => &["焦虑", "担心", "紧张", "不安", "恐惧", "害怕", "恐慌", "压力"],
            (Emotion::Anxious, "en") => &["anxious", "worried", "nervous", "fearful", "scared", "panic", "stress"],
            (Emotion::Anxious, "ja") => &["心配", "不安", "緊張", "恐れる", "怖い", "パニック", "ストレス"],
            (Emotion::Anxious, "ko") => &["걱정", "불안", "긴장", "두려움", "무서움", "패닉", "스트레스"],
            (Emotion::Anxious, "fr") => &["anxieux", "inquiet", "nerveux", "peur", "panique", "stress"],
            (Emotion::Anxious, "de") => &["ängstlich", "besorgt", "nervös", "angst", "panik", "stress"],
            (Emotion::Anxious, "es") => &["ansioso", "preocupado", "nervioso", "miedo", "pánico", "estrés"],
            (Emotion::Anxious, "ru") => &["тревожный", "беспокойный", "нервный", "страх", "паника", "стресс"],
            (Emotion::Anxious, "ar") => &["قلق", "مقلق", "متوتر", "خوف", "ذعر", "توتر"],
            (Emotion::Anxious, "hi") => &["चिंतित", "परेशान", "तनावग्रस्त", "डर", "आतंक", "तनाव"],

            (Emotion::Calm, "zh") => &["平静", "冷静", "淡定", "放松", "安宁", "舒适", "轻松", "平和"],
            (Emotion::Calm, "en") => &["calm", "peaceful", "relaxed", "tranquil", "comfortable", "easy"],
            (Emotion::Calm, "ja") => &["落ち着く", "静か", "リラックス", "安らか", "快適", "穏やか"],
            (Emotion::Calm, "ko") => &["차분하다", "평온하다", "편안하다", "안정적", "편리하다"],
            (Emotion::Calm, "fr") => &["calme", "paisible", "détendu", "tranquille", "confortable"],
            (Emotion::Calm, "de") => &["ruhig", "friedlich", "entspannt", "bequem", "gelassen"],
            (Emotion::Calm, "es") => &["tranquilo", "pacífico", "relajado", "cómodo", "sereno"],
            (Emotion::Calm, "ru") => &["спокойный", "мирный", "расслабленный", "комфортный"],
            (Emotion::Calm, "ar") => &["هادئ", "سلمي", "مسترخي", "مريح", "مطمئن"],
            (Emotion::Calm, "hi") => &["शांत", "शांतिपूर्ण", "आरामदायक", "सहज", "सुखद"],

            (Emotion::Neutral, "zh") => &["一般", "还行", "正常", "普通", "平常", "一般般"],
            (Emotion::Neutral, "en") => &["normal", "okay", "fine", "ordinary", "usual", "alright"],
            (Emotion::Neutral, "ja") => &["普通", "まあまあ", "通常", "一般的", "大丈夫"],
            (Emotion::Neutral, "ko") => &["보통", "괜찮다", "일반적", "평상시", "그럭저럭"],
            (Emotion::Neutral, "fr") => &["normal", "correct", "ordinaire", "habituel", "pas mal"],
            (Emotion::Neutral, "de") => &["normal", "okay", "gewöhnlich", "üblich", "in ordnung"],
            (Emotion::Neutral, "es") => &["normal", "bien", "ordinario", "habitual", "regular"],
            (Emotion::Neutral, "ru") => &["нормальный", "хорошо", "обычный", "обычно", "нормально"],
            (Emotion::Neutral, "ar") => &["عادي", "حسن", "معتاد", "طبيعي", "مقبول"],
            (Emotion::Neutral, "hi") => &["सामान्य", "ठीक", "साधारण", "सामान्यतः", "बिलकुल"],
            _ => return None,
        };
        Some(table)
    }

    /// Keyword table for `lang`, the Chinese one when the language has none
    fn keywords_or_chinese(&self, lang: &str) -> &'static [&'static str] {
        self.keywords(lang).or_else(|| self.keywords("zh")).unwrap_or(&[])
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Emotion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Modifier words and their score multipliers, checked in order
const INTENSITY_WORDS: [(&str, f64); 12] = [
    ("很", 2.0),
    ("非常", 2.0),
    ("特别", 2.0),
    ("极其", 2.5),
    ("超级", 2.5),
    ("比较", 1.5),
    ("有点", 1.2),
    ("稍微", 1.1),
    ("略微", 1.1),
    ("不", -1.0),
    ("没", -1.0),
    ("无", -1.0),
];

fn intensity_multiplier(text: &str) -> Option<f64> {
    INTENSITY_WORDS
        .iter()
        .find(|(word, _)| text.contains(word))
        .map(|(_, multiplier)| *multiplier)
}

/// Keyword scoring. Every keyword hit adds the first intensity multiplier
/// found in the text (1.0 without one); only positive scores count and ties
/// go to the earlier emotion.
pub fn rule_based_emotion(text: &str, lang: &str) -> Emotion {
    let lowered = text.to_lowercase();
    let multiplier = intensity_multiplier(&lowered).unwrap_or(1.0);

    let mut best: Option<(Emotion, f64)> = None;
    for emotion in Emotion::ALL {
        let hits = emotion
            .keywords_or_chinese(lang)
            .iter()
            .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
            .count();
        let score = hits as f64 * multiplier;
        if score > 0.0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((emotion, score));
        }
    }

    best.map(|(emotion, _)| emotion).unwrap_or(Emotion::Neutral)
}

/// Strength of `emotion` in `text`, between 0 and 1
pub fn emotion_intensity(text: &str, emotion: Emotion, lang: &str) -> f64 {
    let lowered = text.to_lowercase();
    let hits = emotion
        .keywords(lang)
        .unwrap_or(&[])
        .iter()
        .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
        .count();

    let mut intensity = if hits > 0 { (0.3 + hits as f64 * 0.2).min(1.0) } else { 0.5 };
    if let Some(multiplier) = intensity_multiplier(&lowered) {
        intensity = (intensity * multiplier.abs()).min(1.0);
    }
    intensity
}

/// Detailed analysis returned by the emotion endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmotionDetails {
    #[schema(value_type = String)]
    pub emotion: Emotion,
    pub intensity: f64,
    pub confidence: f64,
    pub suggestions: Vec<String>,
    pub text: String,
    pub lang: String,
}

/// Emotion analysis chain
#[derive(Clone, Default)]
pub struct EmotionService {
    chat: Option<Arc<dyn ChatModel>>,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
}

impl EmotionService {
    pub fn new(chat: Option<Arc<dyn ChatModel>>, sentiment: Option<Arc<dyn SentimentAnalyzer>>) -> Self {
        Self { chat, sentiment }
    }

    /// Emotion of `text` and the method that produced it (`openai`, `azure` or `rule`)
    pub async fn analyze(&self, text: &str, lang: &str) -> (Emotion, &'static str) {
        if let Some(chat) = &self.chat {
            let prompt = format!(
                "分析以下文本的情感，从以下选项中选择一个：\n- 开心\n- 悲伤\n- 愤怒\n- 焦虑\n- 平静\n- 中性\n\n用户文本: {}\n用户语言: {}\n\n请只返回对应的情感标签，不要翻译标签，也不要其他内容。",
                text, lang
            );
            let request = ChatRequest::new("gpt-3.5-turbo", vec![ChatMessage::user(prompt)], 100);
            match chat.complete(request).await {
                Ok(answer) => match Emotion::from_label(&answer) {
                    Some(emotion) => return (emotion, "openai"),
                    None => debug!("Unrecognized emotion label from OpenAI: {}", answer),
                },
                Err(e) => warn!("OpenAI emotion analysis failed: {}", e),
            }
        }

        if let Some(sentiment) = &self.sentiment {
            // Text Analytics is only trusted for Chinese and English here
            let language = if lang == "en" { "en" } else { "zh" };
            match sentiment.sentiment(text.to_string(), language.to_string()).await {
                Ok(label) => {
                    let emotion = match label.as_str() {
                        "positive" => Emotion::Happy,
                        "negative" => Emotion::Sad,
                        _ => Emotion::Neutral,
                    };
                    return (emotion, "azure");
                }
                Err(e) => warn!("Azure sentiment analysis failed: {}", e),
            }
        }

        (rule_based_emotion(text, lang), "rule")
    }

    pub async fn emotion_details(&self, text: &str, lang: &str) -> EmotionDetails {
        let (emotion, _) = self.analyze(text, lang).await;
        EmotionDetails {
            emotion,
            intensity: emotion_intensity(text, emotion, lang),
            confidence: 0.8,
            suggestions: emotion.suggestions().iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
            lang: lang.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockChatModel, MockSentimentAnalyzer, ProviderError};

    #[test]
    fn test_rule_based_emotion() {
        assert_eq!(rule_based_emotion("今天很开心", "zh"), Emotion::Happy);
        assert_eq!(rule_based_emotion("I feel so sad and I cry", "en"), Emotion::Sad);
        assert_eq!(rule_based_emotion("考试让我很紧张，有压力", "zh"), Emotion::Anxious);
        assert_eq!(rule_based_emotion("asdf", "en"), Emotion::Neutral);
    }

    #[test]
    fn test_tie_goes_to_earlier_emotion() {
        // "好" is a happy keyword and "烦躁" an angry one, one hit each
        assert_eq!(rule_based_emotion("好烦躁", "zh"), Emotion::Happy);
    }

    #[test]
    fn test_negation_cancels_keywords() {
        // "不" gives a negative multiplier, so no emotion scores above zero
        assert_eq!(rule_based_emotion("我不开心", "zh"), Emotion::Neutral);
    }

    #[test]
    fn test_unknown_language_uses_chinese_table() {
        assert_eq!(rule_based_emotion("我很生气", "pt"), Emotion::Angry);
    }

    #[test]
    fn test_intensity() {
        assert_eq!(emotion_intensity("nothing here", Emotion::Happy, "en"), 0.5);
        assert!((emotion_intensity("happy and glad", Emotion::Happy, "en") - 0.7).abs() < 1e-9);
        assert_eq!(emotion_intensity("我非常开心快乐", Emotion::Happy, "zh"), 1.0);
    }

    #[test]
    fn test_labels_round_trip() {
        for emotion in Emotion::ALL {
            assert_eq!(Emotion::from_label(emotion.label()), Some(emotion));
        }
        assert_eq!(serde_json::to_string(&Emotion::Calm).unwrap(), "\"平静\"");
    }

    #[tokio::test]
    async fn test_chain_order() {
        let mut chat = MockChatModel::new();
        chat.expect_complete().returning(|_| Ok("焦虑".to_string()));
        let service = EmotionService::new(Some(Arc::new(chat)), None);
        assert_eq!(service.analyze("whatever", "en").await, (Emotion::Anxious, "openai"));

        let mut chat = MockChatModel::new();
        chat.expect_complete()
            .returning(|_| Err(ProviderError::Request("timeout".to_string())));
        let mut sentiment = MockSentimentAnalyzer::new();
        sentiment
            .expect_sentiment()
            .withf(|_, language| language == "zh")
            .returning(|_, _| Ok("positive".to_string()));
        let service = EmotionService::new(Some(Arc::new(chat)), Some(Arc::new(sentiment)));
        assert_eq!(service.analyze("不错", "ja").await, (Emotion::Happy, "azure"));

        let service = EmotionService::default();
        assert_eq!(service.analyze("我很烦躁，讨厌", "zh").await, (Emotion::Angry, "rule"));
    }

    #[tokio::test]
    async fn test_emotion_details() {
        let details = EmotionService::default().emotion_details("I am worried", "en").await;
        assert_eq!(details.emotion, Emotion::Anxious);
        assert_eq!(details.confidence, 0.8);
        assert_eq!(details.suggestions.len(), 4);
        assert_eq!(details.lang, "en");
    }
}
