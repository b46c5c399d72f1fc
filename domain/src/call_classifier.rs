//! The classification gate in front of framework scoring.
//!
//! The gate never fails: when the reasoning engine is unavailable or answers with
//! something unusable, the call is treated as a sales call so it still gets scored.

use entity_api::call_type::CallType;
use log::*;
use meeting_ai::traits::classification::Provider;
use meeting_ai::{CallCategory, CallClassification, ClassificationRequest};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutcome {
    pub verdict: CallClassification,
    /// True when `verdict` is the fail-open default rather than an engine answer.
    pub fell_open: bool,
    pub provider_id: Option<String>,
}

pub struct CallClassifier {
    provider: Option<Arc<dyn Provider>>,
    prefix_chars: usize,
}

impl CallClassifier {
    pub fn new(provider: Option<Arc<dyn Provider>>, prefix_chars: usize) -> Self {
        Self {
            provider,
            prefix_chars,
        }
    }

    pub async fn classify(&self, transcript: &str, participant_count: usize) -> ClassifierOutcome {
        let Some(provider) = &self.provider else {
            warn!("No classification provider configured, treating call as a sales call");
            return Self::fall_open(None);
        };

        let request = ClassificationRequest {
            transcript: truncate_chars(transcript, self.prefix_chars).to_string(),
            participant_count,
        };

        match provider.classify(request).await {
            Ok(verdict) => {
                let verdict = verdict.normalized();
                debug!(
                    "Classified call as {} (sales={}, confidence={:.2})",
                    verdict.call_type.as_str(),
                    verdict.is_sales_call,
                    verdict.confidence
                );
                ClassifierOutcome {
                    verdict,
                    fell_open: false,
                    provider_id: Some(provider.provider_id().to_string()),
                }
            }
            Err(err) => {
                warn!("Classification failed, failing open: {err}");
                Self::fall_open(Some(provider.provider_id().to_string()))
            }
        }
    }

    fn fall_open(provider_id: Option<String>) -> ClassifierOutcome {
        ClassifierOutcome {
            verdict: CallClassification::fail_open(),
            fell_open: true,
            provider_id,
        }
    }
}

/// The first `max_chars` characters of `text`, cut on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn call_type_for(category: CallCategory) -> CallType {
    match category {
        CallCategory::SalesCall => CallType::SalesCall,
        CallCategory::TeamMeeting => CallType::TeamMeeting,
        CallCategory::Demo => CallType::Demo,
        CallCategory::Support => CallType::Support,
        CallCategory::Development => CallType::Development,
        CallCategory::StandUp => CallType::StandUp,
        CallCategory::Unknown => CallType::Unknown,
    }
}
