//! The provider-neutral shape of a recorded call, as handed to the ingestion orchestrator
//! by both the webhook intake and the provider sync.

use chrono::{DateTime, FixedOffset};
use entity_api::json_types::Participant;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Where an ingested call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSource {
    Webhook,
    Sync,
}

impl fmt::Display for IngestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestSource::Webhook => write!(f, "webhook"),
            IngestSource::Sync => write!(f, "sync"),
        }
    }
}

/// The rep a provider says recorded the call. Only the sync path receives one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedBy {
    pub name: String,
    pub email: String,
    pub team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallEvent {
    pub source: IngestSource,
    pub external_call_id: String,
    pub title: String,
    pub start_time: DateTime<FixedOffset>,
    pub duration_seconds: i32,
    /// Absent or empty while the provider is still transcribing.
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub participants: Vec<Participant>,
    pub team: Option<String>,
    pub recorded_by: Option<RecordedBy>,
    /// The payload as received, kept for unmatched-call triage.
    pub raw: Value,
}

impl CallEvent {
    pub fn transcript_chars(&self) -> usize {
        self.transcript
            .as_deref()
            .map(|transcript| transcript.chars().count())
            .unwrap_or(0)
    }

    /// The transcript with blank values treated as missing.
    pub fn usable_transcript(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .filter(|transcript| !transcript.trim().is_empty())
    }

    pub fn participant_emails(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(Participant::normalized_email)
            .collect()
    }
}
