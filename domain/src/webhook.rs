//! Inbound provider webhooks: signature check, structural validation and sanitising.

use crate::call_event::{CallEvent, IngestSource};
use crate::error::Error;
use chrono::{DateTime, FixedOffset};
use email_address::EmailAddress;
use entity_api::json_types::Participant;
use log::*;
use meeting_auth::webhook::{HmacWebhookValidator, WebhookValidator};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use service::config::Config;
use std::collections::HashMap;

pub const FATHOM_PROVIDER_ID: &str = "fathom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    CallCompleted,
    CallStarted,
    CallFailed,
}

impl WebhookEvent {
    pub const ALL: [&'static str; 3] = ["call_completed", "call_started", "call_failed"];

    fn parse(event: &str) -> Option<Self> {
        match event {
            "call_completed" => Some(WebhookEvent::CallCompleted),
            "call_started" => Some(WebhookEvent::CallStarted),
            "call_failed" => Some(WebhookEvent::CallFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::CallCompleted => "call_completed",
            WebhookEvent::CallStarted => "call_started",
            WebhookEvent::CallFailed => "call_failed",
        }
    }
}

/// Why a payload was refused. Rendered as a 400 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookRejection {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl WebhookRejection {
    fn invalid(error: String) -> Self {
        Self {
            error,
            missing_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedWebhook {
    pub event: WebhookEvent,
    /// Sanitised call, ready for the orchestrator.
    pub call: CallEvent,
}

/// Checks the HMAC signature of the raw body. Header names must be lower-cased.
pub fn verify_signature(
    config: &Config,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Result<(), Error> {
    let secret = config
        .fathom_webhook_secret()
        .ok_or_else(|| Error::config("Webhook secret not configured"))?;
    let validator = HmacWebhookValidator::new(
        FATHOM_PROVIDER_ID,
        SecretString::new(secret),
        config.fathom_signature_header(),
    );

    if validator.validate(headers, body)? {
        Ok(())
    } else {
        warn!("Rejected {} webhook with a mismatched signature", validator.provider_id());
        Err(Error::unauthenticated("Invalid webhook signature"))
    }
}

fn non_empty_str<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn pointer_name(pointer: &str) -> String {
    pointer.trim_start_matches('/').replace('/', ".")
}

/// Validates the payload structure and returns the sanitised call.
///
/// `meeting.transcript` may be missing or empty; the orchestrator defers such calls.
pub fn validate_payload(payload: &Value) -> Result<ValidatedWebhook, WebhookRejection> {
    let mut missing_fields = Vec::new();

    for pointer in ["/event", "/call_id"] {
        if non_empty_str(payload, pointer).is_none() {
            missing_fields.push(pointer_name(pointer));
        }
    }

    match payload.get("meeting").filter(|meeting| meeting.is_object()) {
        None => missing_fields.push("meeting".to_string()),
        Some(_) => {
            for pointer in ["/meeting/title", "/meeting/start_time", "/meeting/recording_url"] {
                if non_empty_str(payload, pointer).is_none() {
                    missing_fields.push(pointer_name(pointer));
                }
            }
            if !payload
                .pointer("/meeting/duration")
                .is_some_and(Value::is_number)
            {
                missing_fields.push("meeting.duration".to_string());
            }
            match payload.pointer("/meeting/participants").and_then(Value::as_array) {
                None => missing_fields.push("meeting.participants".to_string()),
                Some(participants) if participants.is_empty() => {
                    missing_fields.push("meeting.participants (empty array)".to_string())
                }
                Some(participants) => {
                    for (index, participant) in participants.iter().enumerate() {
                        for field in ["name", "email"] {
                            if non_empty_str(participant, &format!("/{field}")).is_none() {
                                missing_fields.push(format!("meeting.participants[{index}].{field}"));
                            }
                        }
                    }
                }
            }
        }
    }

    if !missing_fields.is_empty() {
        return Err(WebhookRejection {
            error: "Missing required fields".to_string(),
            missing_fields,
        });
    }

    // Every field below was checked for presence above.
    let event_label = non_empty_str(payload, "/event").unwrap_or_default();
    let event = WebhookEvent::parse(event_label).ok_or_else(|| {
        WebhookRejection::invalid(format!(
            "Invalid event type: {event_label}. Must be one of: {}",
            WebhookEvent::ALL.join(", ")
        ))
    })?;

    let start_time: DateTime<FixedOffset> =
        DateTime::parse_from_rfc3339(non_empty_str(payload, "/meeting/start_time").unwrap_or_default())
            .map_err(|_| {
                WebhookRejection::invalid("Invalid start_time format. Must be ISO 8601".to_string())
            })?;

    let mut participants = Vec::new();
    for participant in payload
        .pointer("/meeting/participants")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let email = non_empty_str(participant, "/email")
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if !EmailAddress::is_valid(&email) {
            return Err(WebhookRejection::invalid(format!(
                "Invalid email format: {email}"
            )));
        }
        let name = non_empty_str(participant, "/name").unwrap_or_default().trim();
        participants.push(Participant::new(name, email));
    }

    let duration = payload
        .pointer("/meeting/duration")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .max(0.0)
        .min(i32::MAX as f64) as i32;
    let transcript = payload
        .pointer("/meeting/transcript")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|transcript| !transcript.is_empty())
        .map(str::to_string);

    let trimmed = |pointer: &str| {
        non_empty_str(payload, pointer)
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    Ok(ValidatedWebhook {
        event,
        call: CallEvent {
            source: IngestSource::Webhook,
            external_call_id: trimmed("/call_id"),
            title: trimmed("/meeting/title"),
            start_time,
            duration_seconds: duration,
            transcript,
            recording_url: Some(trimmed("/meeting/recording_url")),
            participants,
            team: payload
                .pointer("/meeting/team")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|team| !team.is_empty())
                .map(str::to_string),
            recorded_by: None,
            raw: payload.clone(),
        },
    })
}
