//! Classification gate request and verdict.

use serde::{Deserialize, Serialize};

/// Kind of meeting a transcript was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallCategory {
    SalesCall,
    TeamMeeting,
    Demo,
    Support,
    Development,
    StandUp,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CallCategory {
    /// Lenient parse for model output; anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "sales_call" | "sales" => CallCategory::SalesCall,
            "team_meeting" => CallCategory::TeamMeeting,
            "demo" => CallCategory::Demo,
            "support" => CallCategory::Support,
            "development" => CallCategory::Development,
            "stand_up" | "standup" => CallCategory::StandUp,
            _ => CallCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallCategory::SalesCall => "sales_call",
            CallCategory::TeamMeeting => "team_meeting",
            CallCategory::Demo => "demo",
            CallCategory::Support => "support",
            CallCategory::Development => "development",
            CallCategory::StandUp => "stand_up",
            CallCategory::Unknown => "unknown",
        }
    }
}

/// Input to a classification provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRequest {
    /// Transcript prefix, already truncated by the caller
    pub transcript: String,
    /// Number of attendees; a single attendee hints at a solo recording
    pub participant_count: usize,
}

/// Verdict of the classification gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallClassification {
    pub is_sales_call: bool,
    pub call_type: CallCategory,
    /// In [0.0, 1.0]
    pub confidence: f64,
    pub reasoning: String,
    /// Present only when `is_sales_call` is false
    pub rejection_reason: Option<String>,
}

impl CallClassification {
    /// Reasoning recorded when the engine could not be consulted.
    pub const FAIL_OPEN_REASONING: &'static str =
        "Classification failed, assuming sales call to be safe";

    /// The verdict used when classification fails: treat the call as a sales
    /// call so it is scored rather than silently dropped.
    pub fn fail_open() -> Self {
        Self {
            is_sales_call: true,
            call_type: CallCategory::Unknown,
            confidence: 0.5,
            reasoning: Self::FAIL_OPEN_REASONING.to_string(),
            rejection_reason: None,
        }
    }

    /// Clamps confidence into range and makes `rejection_reason` agree with
    /// `is_sales_call`: always set for a rejection, never for a sales call.
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.5
        };

        if self.is_sales_call {
            self.rejection_reason = None;
        } else {
            let missing = self
                .rejection_reason
                .as_deref()
                .map(|reason| reason.trim().is_empty())
                .unwrap_or(true);
            if missing {
                self.rejection_reason = Some(if self.reasoning.trim().is_empty() {
                    format!("Classified as {}", self.call_type.as_str())
                } else {
                    self.reasoning.clone()
                });
            }
        }

        self
    }
}
