// Domain services
// Business logic behind the HTTP and WebSocket surfaces.

pub mod dashboard;
pub mod emotion;
pub mod explain;
pub mod health_data;
pub mod interactions;
pub mod language;
pub mod navigation;
pub mod nlp;
pub mod sessions;
pub mod speech;
pub mod translation;
pub mod users;
pub mod voice_pipeline;
pub mod voice_styles;

use std::env;
use std::sync::Arc;

use tracing::{info, warn};
use validator::ValidationErrors;

use voice_companion_data::config_tables::ConfigTables;
use voice_companion_data::database::DatabasePool;
use voice_companion_data::repository::{
    HealthDataRepository, InteractionRepository, SessionRepository, UserRepository,
};

use crate::health::HealthService;
use crate::providers::{
    AzureSpeechClient, AzureTextAnalyticsClient, ChatModel, DeepLClient, OpenAiClient, ProviderError,
    ProviderSettings, SentimentAnalyzer, SpeechRecognizer, SpeechSynthesizer, TextTranslator,
};

// Re-export the service types used by the API layer
pub use emotion::{Emotion, EmotionService};
pub use explain::ExplainService;
pub use health_data::{HealthDataService, HealthDataServiceError};
pub use interactions::{InteractionService, InteractionServiceError};
pub use navigation::{NavigationResult, NavigationService};
pub use nlp::NlpService;
pub use sessions::{SessionManager, SessionServiceError};
pub use speech::{SttService, TtsService};
pub use translation::TranslationService;
pub use users::{UserService, UserServiceError};
pub use voice_pipeline::{TextReply, Utterance, VoiceEvent, VoicePipeline, VoicePipelineError};

/// Flatten validator field errors into `field: message, message; field: message`
pub fn flatten_validation_errors(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<String>>()
        .join("; ")
}

/// Whether `EXPLAIN_RESPONSES` asks for reply explanations
fn explain_enabled() -> bool {
    env::var("EXPLAIN_RESPONSES")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Provider clients built from [`ProviderSettings`]; absent credentials leave a slot empty
#[derive(Clone, Default)]
pub struct Providers {
    pub chat: Option<Arc<dyn ChatModel>>,
    pub whisper: Option<Arc<dyn SpeechRecognizer>>,
    pub azure_stt: Option<Arc<dyn SpeechRecognizer>>,
    pub azure_tts: Option<Arc<dyn SpeechSynthesizer>>,
    pub openai_tts: Option<Arc<dyn SpeechSynthesizer>>,
    pub sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    pub translator: Option<Arc<dyn TextTranslator>>,
}

impl Providers {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let mut providers = Providers::default();

        if let Some(key) = &settings.openai_api_key {
            let openai = Arc::new(OpenAiClient::new(&settings.openai_base_url, key, settings.timeout_secs)?);
            providers.chat = Some(openai.clone());
            providers.whisper = Some(openai.clone());
            providers.openai_tts = Some(openai);
        } else {
            warn!("OPENAI_API_KEY not set; chat, Whisper and OpenAI TTS are disabled");
        }

        if let Some(key) = &settings.azure_speech_key {
            let azure = Arc::new(AzureSpeechClient::new(
                key,
                &settings.tts_region,
                &settings.stt_region,
                settings.timeout_secs,
            )?);
            providers.azure_stt = Some(azure.clone());
            providers.azure_tts = Some(azure);
        } else {
            warn!("AZURE_SPEECH_KEY not set; Azure speech is disabled");
        }

        if let (Some(key), Some(endpoint)) = (&settings.azure_emotion_key, &settings.azure_emotion_endpoint) {
            providers.sentiment = Some(Arc::new(AzureTextAnalyticsClient::new(endpoint, key)?));
        }

        if let Some(key) = &settings.deepl_api_key {
            providers.translator = Some(Arc::new(DeepLClient::new(key, settings.timeout_secs)?));
        }

        info!(
            chat = providers.chat.is_some(),
            azure_speech = providers.azure_tts.is_some(),
            sentiment = providers.sentiment.is_some(),
            deepl = providers.translator.is_some(),
            "Providers configured"
        );
        Ok(providers)
    }
}

/// Every service the application uses, wired to one pool and one set of tables
#[derive(Clone)]
pub struct Services {
    pub config: Arc<ConfigTables>,
    pub users: Arc<UserService>,
    pub sessions: Arc<SessionManager>,
    pub nlp: Arc<NlpService>,
    pub navigation: Arc<NavigationService>,
    pub emotion: Arc<EmotionService>,
    pub translation: Arc<TranslationService>,
    pub stt: SttService,
    pub tts: TtsService,
    pub interactions: InteractionService,
    pub health_data: Arc<HealthDataService>,
    pub health: Arc<HealthService>,
    pub pipeline: VoicePipeline,
    pub user_repository: Arc<UserRepository>,
}

impl Services {
    pub fn new(pool: DatabasePool, config: Arc<ConfigTables>, providers: Providers) -> Self {
        let user_repository = Arc::new(UserRepository::new(pool.clone()));
        let sessions = Arc::new(SessionManager::new(Arc::new(SessionRepository::new(pool.clone()))));
        let interactions = InteractionService::new(Arc::new(InteractionRepository::new(pool.clone())));

        let nlp = Arc::new(NlpService::new(config.clone(), providers.chat.clone()));
        let navigation = Arc::new(NavigationService::new(config.clone(), providers.chat.clone()));
        let emotion = Arc::new(EmotionService::new(providers.chat.clone(), providers.sentiment.clone()));
        let translation = Arc::new(TranslationService::new(providers.translator.clone(), providers.chat.clone()));
        let stt = SttService::new(providers.whisper.clone(), providers.azure_stt.clone());
        let tts = TtsService::new(providers.azure_tts.clone(), providers.openai_tts.clone());
        let explain = ExplainService::new(providers.chat.clone(), explain_enabled());

        let pipeline = VoicePipeline::new(
            sessions.clone(),
            stt.clone(),
            tts.clone(),
            navigation.clone(),
            emotion.clone(),
            nlp.clone(),
            translation.clone(),
            explain,
            interactions.clone(),
        );

        Self {
            users: Arc::new(UserService::new(user_repository.clone())),
            health_data: Arc::new(HealthDataService::new(Arc::new(HealthDataRepository::new(pool.clone())))),
            health: Arc::new(HealthService::new(pool, config.clone())),
            config,
            sessions,
            nlp,
            navigation,
            emotion,
            translation,
            stt,
            tts,
            interactions,
            pipeline,
            user_repository,
        }
    }

    /// Services with every provider configured from the environment
    pub fn from_env(pool: DatabasePool, config: Arc<ConfigTables>) -> Result<Self, ProviderError> {
        let providers = Providers::from_settings(&ProviderSettings::from_env())?;
        Ok(Self::new(pool, config, providers))
    }
}
