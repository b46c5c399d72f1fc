//! Event handlers that turn pipeline events into log lines and webhook_logs rows.

use crate::store::AuditLogStore;
use crate::Id;
use async_trait::async_trait;
use chrono::Utc;
use entity_api::webhook_logs;
use events::{DomainEvent, EventHandler, EventTrail};
use log::*;
use serde_json::Value;
use std::sync::Arc;

/// Renders every event as one log line.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::CallReceived {
                external_call_id,
                source,
                transcript_chars,
            } => info!(
                "[{source}] call_received {external_call_id} ({transcript_chars} transcript chars)"
            ),
            DomainEvent::MatchAttempted {
                external_call_id,
                matched,
                rep_id,
                candidates,
            } => info!(
                "match_attempted {external_call_id}: matched={matched} rep={rep_id:?} candidates={candidates}"
            ),
            DomainEvent::CallUnmatched {
                external_call_id,
                participant_emails,
            } => warn!(
                "call_unmatched {external_call_id}: no active rep among {participant_emails:?}, stored for review"
            ),
            DomainEvent::TeamFiltered {
                external_call_id,
                rep_id,
                team,
            } => info!("team_filtered {external_call_id}: rep {rep_id} does not own team {team:?}"),
            DomainEvent::TranscriptDeferred {
                external_call_id,
                transcript_chars,
                minimum,
                ..
            } => info!(
                "transcript_deferred {external_call_id}: {transcript_chars} < {minimum} chars, left pending"
            ),
            DomainEvent::ClassificationCompleted {
                external_call_id,
                is_sales_call,
                call_type,
                confidence,
                fell_open,
                ..
            } => info!(
                "classification_completed {external_call_id}: sales={is_sales_call} type={call_type} confidence={confidence:.2} fell_open={fell_open}"
            ),
            DomainEvent::StatusTransitioned {
                external_call_id,
                from,
                to,
                ..
            } => info!("status_transitioned {external_call_id}: {from} -> {to}"),
            DomainEvent::AnalysisStored {
                call_id,
                analysis_id,
                framework_score,
                ..
            } => debug!(
                "analysis_stored call={call_id} analysis={analysis_id} framework_score={framework_score:?}"
            ),
            DomainEvent::AnalysisFailed {
                external_call_id,
                error,
                ..
            } => error!("analysis_failed {external_call_id}: {error}"),
            DomainEvent::ReconciliationCompleted {
                operation,
                examined,
                changed,
            } => info!("reconciliation_completed {operation}: examined={examined} changed={changed}"),
            DomainEvent::RequestHandled {
                endpoint,
                method,
                status_code,
                processing_time_ms,
                error_message,
                ..
            } => match error_message {
                Some(message) => warn!(
                    "{method} {endpoint} -> {status_code} in {processing_time_ms}ms: {message}"
                ),
                None => info!("{method} {endpoint} -> {status_code} in {processing_time_ms}ms"),
            },
        }
    }
}

/// Persists `RequestHandled` events as webhook_logs rows. A failed write is logged and dropped.
pub struct AuditWriter {
    store: Arc<dyn AuditLogStore>,
}

impl AuditWriter {
    pub fn new(store: Arc<dyn AuditLogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for AuditWriter {
    async fn handle(&self, event: &DomainEvent) {
        let DomainEvent::RequestHandled {
            endpoint,
            method,
            payload,
            status_code,
            error_message,
            processing_time_ms,
            trail,
        } = event
        else {
            return;
        };

        let row = webhook_logs::Model {
            id: Id::new_v4(),
            endpoint: endpoint.clone(),
            method: method.clone(),
            payload: payload.clone(),
            status_code: i32::from(*status_code),
            error_message: error_message.clone(),
            processing_time_ms: *processing_time_ms as i64,
            events: trail.clone(),
            created_at: Utc::now().into(),
        };

        if let Err(err) = self.store.append_webhook_log(row).await {
            error!("Failed to write audit log for {method} {endpoint}: {err}");
        }
    }
}

/// Builds the event closing out one inbound request.
pub fn request_handled(
    endpoint: &str,
    method: &str,
    payload: Value,
    status_code: u16,
    error_message: Option<String>,
    trail: &EventTrail,
) -> DomainEvent {
    DomainEvent::RequestHandled {
        endpoint: endpoint.to_string(),
        method: method.to_string(),
        payload,
        status_code,
        error_message,
        processing_time_ms: trail.elapsed_ms(),
        trail: trail.to_json(),
    }
}
