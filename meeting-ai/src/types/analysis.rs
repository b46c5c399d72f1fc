//! Framework scoring request and result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on key topics kept per analysis.
pub const MAX_KEY_TOPICS: usize = 6;

/// Input to a scoring provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequest {
    /// Provider recording id, for log correlation
    pub external_call_id: String,
    pub meeting_title: String,
    pub transcript: String,
    pub rep_name: Option<String>,
    pub call_date: DateTime<Utc>,
    pub duration_seconds: i32,
}

/// Outcome of scoring one sales call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// 0-100
    pub framework_score: i32,
    /// 0-100; derived from `framework_score` when the provider has none
    pub sentiment_score: Option<i32>,
    pub key_topics: Vec<String>,
    /// Provider specific detail (pillar scores, feedback, red flags)
    pub analysis_data: Value,
}

impl ScoringResult {
    /// Framework score clamped to 0-100.
    pub fn bounded_framework_score(&self) -> i32 {
        self.framework_score.clamp(0, 100)
    }

    /// Provider sentiment if present, otherwise a coarse band of the framework score.
    pub fn sentiment_or_derived(&self) -> i32 {
        match self.sentiment_score {
            Some(score) => score.clamp(0, 100),
            None => match self.bounded_framework_score() {
                score if score >= 70 => 80,
                score if score >= 50 => 60,
                _ => 40,
            },
        }
    }

    /// Non-empty topics, trimmed, at most [`MAX_KEY_TOPICS`].
    pub fn capped_key_topics(&self) -> Vec<String> {
        self.key_topics
            .iter()
            .map(|topic| topic.trim())
            .filter(|topic| !topic.is_empty())
            .take(MAX_KEY_TOPICS)
            .map(str::to_string)
            .collect()
    }
}
