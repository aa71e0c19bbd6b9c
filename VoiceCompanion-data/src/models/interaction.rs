use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged AI interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    pub log_id: i64,
    pub session_id: Option<String>,
    pub user_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub ai_reply: String,
    pub emotion: Option<String>,
    pub intent_id: Option<i64>,
    pub confidence: Option<f64>,
    pub explanation: Option<String>,
    pub processing_time: Option<f64>,
    pub model_used: Option<String>,
    pub language: Option<String>,
}

/// Input for logging an interaction
#[derive(Debug, Clone, Default)]
pub struct NewInteractionLog {
    pub session_id: Option<String>,
    pub user_id: Option<i64>,
    pub user_input: String,
    pub ai_reply: String,
    pub emotion: Option<String>,
    pub intent_id: Option<i64>,
    pub confidence: Option<f64>,
    pub explanation: Option<String>,
    pub processing_time: Option<f64>,
    pub model_used: Option<String>,
    pub language: Option<String>,
}

/// Aggregates over a time window of interactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionStatistics {
    pub total_interactions: i64,
    pub intent_distribution: BTreeMap<String, i64>,
    pub emotion_distribution: BTreeMap<String, i64>,
    pub language_distribution: BTreeMap<String, i64>,
    pub average_confidence: f64,
    pub period_days: i64,
}

impl InteractionStatistics {
    /// Fold a set of logs into statistics
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a InteractionLog>, period_days: i64) -> Self {
        let mut stats = InteractionStatistics {
            period_days,
            ..Default::default()
        };
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;

        for log in logs {
            stats.total_interactions += 1;
            if let Some(intent) = log.intent_id {
                *stats.intent_distribution.entry(intent.to_string()).or_insert(0) += 1;
            }
            if let Some(emotion) = &log.emotion {
                *stats.emotion_distribution.entry(emotion.clone()).or_insert(0) += 1;
            }
            if let Some(language) = &log.language {
                *stats.language_distribution.entry(language.clone()).or_insert(0) += 1;
            }
            if let Some(confidence) = log.confidence {
                confidence_sum += confidence;
                confidence_count += 1;
            }
        }

        if confidence_count > 0 {
            stats.average_confidence = confidence_sum / confidence_count as f64;
        }
        stats
    }
}
