//! One spoken turn: recognition, understanding, reply audio and bookkeeping

use std::sync::Arc;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use voice_companion_data::models::{MessageType, NewConversationMessage, NewInteractionLog};

use crate::services::emotion::{Emotion, EmotionService};
use crate::services::explain::{ExplainInput, ExplainService};
use crate::services::interactions::InteractionService;
use crate::services::language::{detect_by_script, split_sentences, DEFAULT_LANGUAGE};
use crate::services::navigation::{NavigationResult, NavigationService};
use crate::services::nlp::{NlpService, GENERAL_INTENT_ID, HISTORY_LIMIT, SERVICE_UNAVAILABLE_REPLY};
use crate::services::sessions::{SessionManager, SessionServiceError};
use crate::services::speech::{SttService, TtsService};
use crate::services::translation::TranslationService;

/// Confidence reported when nothing was recognized
const UNRECOGNIZED_CONFIDENCE: f64 = 0.1;
/// Confidence reported with [`SERVICE_UNAVAILABLE_REPLY`]
const UNAVAILABLE_CONFIDENCE: f64 = 0.3;

/// Answer to a typed message
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TextReply {
    pub response: String,
    pub session_id: Option<String>,
    pub intent_id: i64,
    pub confidence: f64,
}

/// Message pushed to the client while a turn is processed
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    /// Audio for one sentence of the reply
    AudioSegment {
        index: usize,
        total: usize,
        text: String,
        /// Base64 encoded audio
        base64audio: String,
        method: String,
    },
    /// Summary of the turn, always the last event; the tag spelling is what clients expect
    #[serde(rename = "conclution")]
    Conclusion {
        emotion: String,
        intent: String,
        confidence: f64,
        explain: String,
        navigation: NavigationResult,
        user_id: i64,
        username: String,
    },
}

/// Input for one spoken turn
#[derive(Debug, Clone)]
pub struct Utterance {
    pub user_id: i64,
    pub username: String,
    pub session_id: String,
    pub audio: Vec<u8>,
    pub voice_style: Option<String>,
    /// Route of the page the user is looking at
    pub current_route: Option<String>,
}

#[derive(Debug, Error)]
pub enum VoicePipelineError {
    #[error("Session error: {0}")]
    Session(#[from] SessionServiceError),

    /// The receiving side went away mid-turn
    #[error("Client disconnected")]
    Disconnected,
}

/// What the assistant understood and answered
struct Understanding {
    reply: String,
    emotion: Emotion,
    intent_id: i64,
    intent_description: String,
    confidence: f64,
    explain: String,
    navigation: NavigationResult,
}

/// Runs spoken turns end to end
#[derive(Clone)]
pub struct VoicePipeline {
    sessions: Arc<SessionManager>,
    stt: SttService,
    tts: TtsService,
    navigation: Arc<NavigationService>,
    emotion: Arc<EmotionService>,
    nlp: Arc<NlpService>,
    translation: Arc<TranslationService>,
    explain: ExplainService,
    interactions: InteractionService,
}

impl VoicePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionManager>,
        stt: SttService,
        tts: TtsService,
        navigation: Arc<NavigationService>,
        emotion: Arc<EmotionService>,
        nlp: Arc<NlpService>,
        translation: Arc<TranslationService>,
        explain: ExplainService,
        interactions: InteractionService,
    ) -> Self {
        Self { sessions, stt, tts, navigation, emotion, nlp, translation, explain, interactions }
    }

    async fn understand(
        &self,
        session_id: &str,
        text: &str,
        lang: &str,
        current_route: Option<&str>,
    ) -> Result<Understanding, VoicePipelineError> {
        let (mut navigation, nav_method) = self.navigation.detect(text, lang).await;
        if navigation.route().is_some() && navigation.route() == current_route {
            navigation = NavigationResult::none_with_message("已在当前页面");
        }
        debug!(method = nav_method, ?navigation, "Navigation detected");

        let (emotion, emotion_method) = self.emotion.analyze(text, lang).await;
        debug!(method = emotion_method, %emotion, "Emotion detected");

        let history = self.sessions.get_conversation_history(session_id, HISTORY_LIMIT).await?;
        let outcome = self.nlp.process(text, lang, &history, current_route).await;
        let intent_description = self.nlp.intent_description(outcome.intent_id).unwrap_or_default();

        let (explain, _) = self
            .explain
            .explain(ExplainInput {
                text,
                reply: &outcome.reply,
                intent_id: outcome.intent_id,
                intent_description: &intent_description,
                emotion,
                lang,
            })
            .await;

        Ok(Understanding {
            reply: outcome.reply,
            emotion,
            intent_id: outcome.intent_id,
            intent_description,
            confidence: outcome.confidence,
            explain,
            navigation,
        })
    }

    /// Most recently used active session of the user, opened when there is none
    async fn text_session(&self, user_id: i64) -> Result<String, SessionServiceError> {
        let active = self.sessions.get_user_active_sessions(user_id).await?;
        match active.into_iter().next() {
            Some(session) => Ok(session.session_id),
            None => self.sessions.create_session(user_id, None).await,
        }
    }

    /// Answer a typed message in the user's current session
    pub async fn text_reply(&self, user_id: i64, input: &str) -> TextReply {
        let session_id = match self.text_session(user_id).await {
            Ok(id) => id,
            Err(e) => {
                warn!(user_id, "Could not open a session for a text reply: {}", e);
                return TextReply {
                    response: SERVICE_UNAVAILABLE_REPLY.to_string(),
                    session_id: None,
                    intent_id: GENERAL_INTENT_ID,
                    confidence: UNAVAILABLE_CONFIDENCE,
                };
            }
        };

        let started = Instant::now();
        let lang = detect_by_script(input);
        let outcome = self.nlp.process(input, lang, &[], None).await;
        let processing_time = started.elapsed().as_secs_f64();

        let mut user_message = NewConversationMessage::new(MessageType::User, input);
        user_message.language = Some(lang.to_string());
        let mut ai_message = NewConversationMessage::new(MessageType::Ai, outcome.reply.clone());
        ai_message.intent_id = Some(outcome.intent_id);
        ai_message.confidence = Some(outcome.confidence);
        ai_message.language = Some(lang.to_string());
        ai_message.processing_time = Some(processing_time);
        for message in [user_message, ai_message] {
            if let Err(e) = self.sessions.add_message(&session_id, message).await {
                warn!(%session_id, "Failed to store text exchange: {}", e);
            }
        }

        self.interactions
            .log_interaction(NewInteractionLog {
                session_id: Some(session_id.clone()),
                user_id: Some(user_id),
                user_input: input.to_string(),
                ai_reply: outcome.reply.clone(),
                intent_id: Some(outcome.intent_id),
                confidence: Some(outcome.confidence),
                processing_time: Some(processing_time),
                language: Some(lang.to_string()),
                ..Default::default()
            })
            .await;

        TextReply {
            response: outcome.reply,
            session_id: Some(session_id),
            intent_id: outcome.intent_id,
            confidence: outcome.confidence,
        }
    }

    /// Process one recorded utterance, streaming [`VoiceEvent`]s into `events`
    pub async fn process(&self, utterance: Utterance, events: &mpsc::Sender<VoiceEvent>) -> Result<(), VoicePipelineError> {
        let started = Instant::now();
        let session_id = self
            .sessions
            .get_or_create_session(utterance.user_id, Some(&utterance.session_id), utterance.voice_style.as_deref())
            .await?;
        let preferred = self
            .sessions
            .get_session(&session_id)
            .await?
            .map(|s| s.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let transcription = self.stt.transcribe(utterance.audio, Some(&preferred)).await;
        let lang = transcription.lang.clone();
        info!(
            user_id = utterance.user_id,
            succ = transcription.succ,
            %lang,
            method = %transcription.method,
            "Speech recognized"
        );
        self.sessions.update_session_language(&session_id, &lang).await?;

        let understanding = if transcription.succ {
            self.understand(&session_id, &transcription.text, &lang, utterance.current_route.as_deref())
                .await?
        } else {
            Understanding {
                reply: transcription.text.clone(),
                emotion: Emotion::Neutral,
                intent_id: GENERAL_INTENT_ID,
                intent_description: String::new(),
                confidence: UNRECOGNIZED_CONFIDENCE,
                explain: String::new(),
                navigation: NavigationResult::none(),
            }
        };

        let sentences = split_sentences(&understanding.reply, &lang);
        let total = sentences.len();
        for (index, sentence) in sentences.into_iter().enumerate() {
            let (audio, method) = self
                .tts
                .synthesize(&sentence, &lang, understanding.emotion, utterance.voice_style.as_deref())
                .await;
            let segment = VoiceEvent::AudioSegment {
                index,
                total,
                text: sentence,
                base64audio: STANDARD.encode(audio),
                method: method.to_string(),
            };
            events.send(segment).await.map_err(|_| VoicePipelineError::Disconnected)?;
        }

        let processing_time = started.elapsed().as_secs_f64();
        let emotion_label = understanding.emotion.label().to_string();

        let mut user_message = NewConversationMessage::new(MessageType::User, transcription.text.clone());
        user_message.language = Some(lang.clone());
        user_message.emotion = Some(emotion_label.clone());
        self.sessions.add_message(&session_id, user_message).await?;

        let mut ai_message = NewConversationMessage::new(MessageType::Ai, understanding.reply.clone());
        ai_message.intent_id = Some(understanding.intent_id);
        ai_message.confidence = Some(understanding.confidence);
        ai_message.emotion = Some(emotion_label.clone());
        ai_message.language = Some(lang.clone());
        ai_message.processing_time = Some(processing_time);
        ai_message.metadata = Some(
            json!({
                "voice_style": utterance.voice_style,
                "explain": understanding.explain,
                "navigation": understanding.navigation,
            })
            .to_string(),
        );
        self.sessions.add_message(&session_id, ai_message).await?;
        if let Err(e) = self.sessions.update_context_summary(&session_id).await {
            warn!(%session_id, "Failed to update context summary: {}", e);
        }

        self.interactions
            .log_interaction(NewInteractionLog {
                session_id: Some(session_id.clone()),
                user_id: Some(utterance.user_id),
                user_input: transcription.text,
                ai_reply: understanding.reply,
                emotion: Some(emotion_label.clone()),
                intent_id: Some(understanding.intent_id),
                confidence: Some(understanding.confidence),
                explanation: Some(understanding.explain.clone()).filter(|e| !e.is_empty()),
                processing_time: Some(processing_time),
                model_used: Some(transcription.method),
                language: Some(lang.clone()),
            })
            .await;

        let conclusion = VoiceEvent::Conclusion {
            emotion: self.translation.translate(&emotion_label, "zh", &lang).await,
            intent: self
                .translation
                .translate(&understanding.intent_description, "zh", &lang)
                .await,
            confidence: understanding.confidence,
            explain: understanding.explain,
            navigation: understanding.navigation,
            user_id: utterance.user_id,
            username: utterance.username,
        };
        events.send(conclusion).await.map_err(|_| VoicePipelineError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockSpeechRecognizer, SpeechRecognizer};
    use crate::testing::sample_config_tables;
    use voice_companion_data::database::create_in_memory_pool;
    use voice_companion_data::models::NewUser;
    use voice_companion_data::repository::{
        InteractionRepository, SessionRepository, UserRepository, UserRepositoryTrait,
    };

    struct Fixture {
        pipeline: VoicePipeline,
        sessions: Arc<SessionManager>,
        interactions: InteractionService,
        user_id: i64,
    }

    async fn fixture(recognized: Option<&'static str>) -> Fixture {
        let pool = create_in_memory_pool().unwrap();
        let user_id = UserRepository::new(pool.clone())
            .create(NewUser { username: "alice".to_string(), password_hash: "x".to_string(), ..Default::default() })
            .await
            .unwrap()
            .id;

        let whisper: Option<Arc<dyn SpeechRecognizer>> = recognized.map(|text| {
            let mut mock = MockSpeechRecognizer::new();
            mock.expect_recognize().returning(move |_, _| Ok(text.to_string()));
            Arc::new(mock) as Arc<dyn SpeechRecognizer>
        });

        let config = sample_config_tables();
        let sessions = Arc::new(SessionManager::new(Arc::new(SessionRepository::new(pool.clone()))));
        let interactions = InteractionService::new(Arc::new(InteractionRepository::new(pool)));
        let pipeline = VoicePipeline::new(
            sessions.clone(),
            SttService::new(whisper, None),
            TtsService::default(),
            Arc::new(NavigationService::new(config.clone(), None)),
            Arc::new(EmotionService::new(None, None)),
            Arc::new(NlpService::new(config, None)),
            Arc::new(TranslationService::new(None, None)),
            ExplainService::default(),
            interactions.clone(),
        );
        Fixture { pipeline, sessions, interactions, user_id }
    }

    async fn run(fixture: &Fixture, session_id: &str, route: Option<&str>) -> Vec<VoiceEvent> {
        let (tx, mut rx) = mpsc::channel(32);
        let utterance = Utterance {
            user_id: fixture.user_id,
            username: "alice".to_string(),
            session_id: session_id.to_string(),
            audio: vec![0u8; 3200],
            voice_style: Some("xiaoxiao".to_string()),
            current_route: route.map(str::to_string),
        };
        fixture.pipeline.process(utterance, &tx).await.unwrap();
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_greeting_turn() {
        let fixture = fixture(Some("你好")).await;
        let session_id = fixture.sessions.create_session(fixture.user_id, None).await.unwrap();
        let events = run(&fixture, &session_id, None).await;

        let (last, segments) = events.split_last().unwrap();
        assert!(!segments.is_empty());
        match &segments[0] {
            VoiceEvent::AudioSegment { index, total, method, base64audio, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(*total, segments.len());
                assert_eq!(method, "local");
                assert!(!base64audio.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        match last {
            VoiceEvent::Conclusion { intent, confidence, navigation, user_id, .. } => {
                assert_eq!(intent, "用户打招呼");
                assert!((confidence - 0.8).abs() < 1e-9);
                assert_eq!(*navigation, NavigationResult::none());
                assert_eq!(*user_id, fixture.user_id);
            }
            other => panic!("unexpected {:?}", other),
        }

        let history = fixture.sessions.get_conversation_history(&session_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "你好");
        assert_eq!(history[1].intent_id, Some(100002));
        let session = fixture.sessions.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.language, "zh");
        assert!(session.context_summary.unwrap().starts_with("用户: 你好"));
        assert_eq!(fixture.interactions.history(Some(fixture.user_id), None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_page_is_not_navigated() {
        let fixture = fixture(Some("看健康数据")).await;
        let session_id = fixture.sessions.create_session(fixture.user_id, None).await.unwrap();

        match run(&fixture, &session_id, Some("/health")).await.last() {
            Some(VoiceEvent::Conclusion { navigation, .. }) => {
                assert_eq!(*navigation, NavigationResult::none_with_message("已在当前页面"));
            }
            other => panic!("unexpected {:?}", other),
        }

        match run(&fixture, &session_id, Some("/settings")).await.last() {
            Some(VoiceEvent::Conclusion { navigation, .. }) => assert_eq!(navigation.route(), Some("/health")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_speech() {
        let fixture = fixture(None).await;
        let session_id = fixture.sessions.create_session(fixture.user_id, None).await.unwrap();
        let events = run(&fixture, &session_id, None).await;

        match events.last() {
            Some(VoiceEvent::Conclusion { emotion, intent, confidence, navigation, .. }) => {
                assert_eq!(emotion, "中性");
                assert_eq!(intent, "");
                assert!((confidence - 0.1).abs() < 1e-9);
                assert_eq!(*navigation, NavigationResult::none());
            }
            other => panic!("unexpected {:?}", other),
        }
        let history = fixture.sessions.get_conversation_history(&session_id, 10).await.unwrap();
        assert_eq!(history[1].intent_id, Some(GENERAL_INTENT_ID));
        assert_eq!(history[1].language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_closed_receiver_stops_the_turn() {
        let fixture = fixture(Some("你好")).await;
        let session_id = fixture.sessions.create_session(fixture.user_id, None).await.unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let utterance = Utterance {
            user_id: fixture.user_id,
            username: "alice".to_string(),
            session_id,
            audio: vec![1, 2, 3, 4],
            voice_style: None,
            current_route: None,
        };
        assert!(matches!(
            fixture.pipeline.process(utterance, &tx).await,
            Err(VoicePipelineError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_text_reply() {
        let fixture = fixture(None).await;
        let reply = fixture.pipeline.text_reply(fixture.user_id, "我最近睡不着").await;

        assert_eq!(reply.intent_id, 100004);
        let session_id = reply.session_id.unwrap();
        let history = fixture.sessions.get_conversation_history(&session_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, reply.response);

        // Later replies land in the same session instead of opening new ones
        let again = fixture.pipeline.text_reply(fixture.user_id, "你好").await;
        assert_eq!(again.session_id.as_deref(), Some(session_id.as_str()));
        assert_eq!(fixture.sessions.get_user_active_sessions(fixture.user_id).await.unwrap().len(), 1);
        assert_eq!(fixture.sessions.get_conversation_history(&session_id, 10).await.unwrap().len(), 4);
    }

    #[test]
    fn test_conclusion_wire_format() {
        let event = VoiceEvent::Conclusion {
            emotion: "开心".to_string(),
            intent: "问候".to_string(),
            confidence: 0.8,
            explain: String::new(),
            navigation: NavigationResult::none(),
            user_id: 1,
            username: "alice".to_string(),
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["type"], "conclution");
        assert_eq!(value["navigation"]["type"], "none");
    }
}
