//! Speech recognition and synthesis

pub mod stt;
pub mod tts;
pub mod wav;

pub use stt::{SttService, Transcription};
pub use tts::{emotion_voice, EmotionVoice, TtsService};
