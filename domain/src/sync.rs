//! Polling import from the meeting-recording provider.

use crate::call_event::CallEvent;
use crate::error::Error;
use crate::gateway::MeetingProvider;
use crate::ingestion::{IngestionOrchestrator, IngestionOutcome};
use crate::store::{CallStore, RepDirectory, Stores};
use chrono::{DateTime, Duration, Utc};
use events::EventTrail;
use log::*;
use serde::Serialize;
use service::config::Config;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Imported,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncedCall {
    pub external_call_id: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub success: bool,
    pub processed: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Start of the window that was requested from the provider.
    pub last_sync_time: DateTime<Utc>,
    pub calls: Vec<SyncedCall>,
    #[serde(rename = "duration_ms")]
    pub duration_ms: u64,
}

impl SyncSummary {
    fn record(&mut self, call: SyncedCall) {
        match call.status {
            SyncStatus::Imported => self.imported += 1,
            SyncStatus::Skipped => self.skipped += 1,
            SyncStatus::Error => self.errors += 1,
        }
        self.calls.push(call);
    }
}

pub struct ProviderSync {
    provider: Arc<dyn MeetingProvider>,
    reps: Arc<dyn RepDirectory>,
    calls: Arc<dyn CallStore>,
    orchestrator: Arc<IngestionOrchestrator>,
    default_lookback_hours: i64,
    max_calls: usize,
}

impl ProviderSync {
    pub fn new(
        config: &Config,
        stores: &Stores,
        provider: Arc<dyn MeetingProvider>,
        orchestrator: Arc<IngestionOrchestrator>,
    ) -> Self {
        Self {
            provider,
            reps: stores.reps.clone(),
            calls: stores.calls.clone(),
            orchestrator,
            default_lookback_hours: config.sync_default_lookback_hours,
            max_calls: config.sync_max_calls,
        }
    }

    pub fn provider(&self) -> &Arc<dyn MeetingProvider> {
        &self.provider
    }

    /// `hours` wins, then the newest sync timestamp on record, then the default lookback.
    async fn since(&self, hours: Option<i64>) -> Result<DateTime<Utc>, Error> {
        if let Some(hours) = hours {
            if hours <= 0 {
                return Err(Error::validation("hours"));
            }
            return Ok(Utc::now() - Duration::hours(hours));
        }
        Ok(match self.calls.latest_call_sync().await? {
            Some(latest) => latest.with_timezone(&Utc),
            None => Utc::now() - Duration::hours(self.default_lookback_hours),
        })
    }

    /// Imports provider calls created after the sync window start. One failing call never aborts the batch.
    pub async fn sync(
        &self,
        hours: Option<i64>,
        trail: &mut EventTrail,
    ) -> Result<SyncSummary, Error> {
        let started = Instant::now();
        let since = self.since(hours).await?;
        info!("Syncing provider calls created after {since}");

        let meetings = self.provider.meetings_since(since, self.max_calls).await?;
        let mut summary = SyncSummary {
            success: true,
            processed: meetings.len(),
            imported: 0,
            skipped: 0,
            errors: 0,
            last_sync_time: since,
            calls: Vec::with_capacity(meetings.len()),
            duration_ms: 0,
        };

        for meeting in meetings {
            let external_call_id = meeting.external_call_id.clone();
            let synced = match self.import(meeting, trail).await {
                Ok(synced) => synced,
                Err(err) => {
                    error!("Failed to import provider call {external_call_id}: {err}");
                    SyncedCall {
                        external_call_id,
                        status: SyncStatus::Error,
                        reason: Some(err.message()),
                    }
                }
            };
            summary.record(synced);
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Provider sync finished in {}ms: {} imported, {} skipped, {} errors",
            summary.duration_ms, summary.imported, summary.skipped, summary.errors
        );
        Ok(summary)
    }

    async fn import(&self, meeting: CallEvent, trail: &mut EventTrail) -> Result<SyncedCall, Error> {
        let external_call_id = meeting.external_call_id.clone();

        if let Some(recorder) = &meeting.recorded_by {
            let email = recorder.email.trim().to_lowercase();
            if !email.is_empty()
                && self
                    .reps
                    .find_active_reps_by_emails(std::slice::from_ref(&email))
                    .await?
                    .is_empty()
            {
                debug!("Skipping {external_call_id}: recorded by {email}, not an active rep");
                return Ok(SyncedCall {
                    external_call_id,
                    status: SyncStatus::Skipped,
                    reason: Some(format!("Recorded by {email} - not an active sales rep")),
                });
            }
        }

        let report = self.orchestrator.ingest(meeting, trail).await?;
        let (status, reason) = match report.outcome {
            IngestionOutcome::Unmatched => (
                SyncStatus::Skipped,
                Some("No active sales rep among participants".to_string()),
            ),
            IngestionOutcome::TeamFiltered { .. } => (
                SyncStatus::Skipped,
                Some("Team not owned by the recording rep".to_string()),
            ),
            IngestionOutcome::AlreadyProcessed { status, .. } => (
                SyncStatus::Skipped,
                Some(format!("Already exists in database ({status})")),
            ),
            IngestionOutcome::Deferred { .. } => (
                SyncStatus::Imported,
                Some("Transcript not ready - left pending".to_string()),
            ),
            IngestionOutcome::Rejected { .. } => (
                SyncStatus::Imported,
                Some("Not a sales call".to_string()),
            ),
            IngestionOutcome::Completed { .. } => (SyncStatus::Imported, None),
            IngestionOutcome::Failed { error, .. } => (SyncStatus::Imported, Some(error)),
        };

        Ok(SyncedCall {
            external_call_id,
            status,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_event::{IngestSource, RecordedBy};
    use crate::error::{DomainErrorKind, ExternalErrorKind};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use entity_api::json_types::Participant;
    use events::EventPublisher;
    use mockall::{mock, predicate::*};
    use serde_json::json;

    mock! {
        pub Provider {}

        #[async_trait]
        impl MeetingProvider for Provider {
            async fn meetings_since(
                &self,
                since: DateTime<Utc>,
                max_calls: usize,
            ) -> Result<Vec<CallEvent>, Error>;
            async fn list_teams(&self) -> Result<Vec<String>, Error>;
        }
    }

    fn meeting(external_call_id: &str, recorder: &str, participant: &str) -> CallEvent {
        CallEvent {
            source: IngestSource::Sync,
            external_call_id: external_call_id.to_string(),
            title: "Intro".to_string(),
            start_time: Utc::now().fixed_offset(),
            duration_seconds: 900,
            // Below the transcript minimum, so imported calls stay pending without a classifier.
            transcript: Some("short".to_string()),
            recording_url: None,
            participants: vec![Participant::new("Someone", participant)],
            team: None,
            recorded_by: Some(RecordedBy {
                name: "Recorder".to_string(),
                email: recorder.to_string(),
                team: None,
            }),
            raw: json!({ "recording_id": external_call_id }),
        }
    }

    fn provider_sync(store: &Arc<MemoryStore>, provider: MockProvider) -> ProviderSync {
        let config = Config::from_defaults();
        let stores = Stores::shared(store.clone());
        let orchestrator = Arc::new(IngestionOrchestrator::new(
            &config,
            &stores,
            None,
            None,
            EventPublisher::new(),
        ));
        ProviderSync::new(&config, &stores, Arc::new(provider), orchestrator)
    }

    #[tokio::test]
    async fn imports_and_skips_per_call() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);

        let mut provider = MockProvider::new();
        provider
            .expect_meetings_since()
            .with(always(), eq(100))
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    meeting("m-1", "jane@co.com", "jane@co.com"),
                    meeting("m-2", "thomas@co.com", "jane@co.com"),
                    meeting("m-3", "jane@co.com", "lead@y.com"),
                ])
            });

        let summary = provider_sync(&store, provider)
            .sync(Some(6), &mut EventTrail::start())
            .await?;

        assert!(summary.success);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.calls[1].status, SyncStatus::Skipped);
        assert!(summary.calls[1]
            .reason
            .as_deref()
            .unwrap()
            .contains("thomas@co.com"));
        assert_eq!(store.calls().len(), 1);
        assert_eq!(store.unmatched().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn window_starts_at_latest_sync() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let seeding = provider_sync(&store, {
            let mut provider = MockProvider::new();
            provider
                .expect_meetings_since()
                .returning(|_, _| Ok(vec![meeting("m-1", "jane@co.com", "jane@co.com")]));
            provider
        });
        seeding.sync(None, &mut EventTrail::start()).await?;
        let latest = store.calls()[0].synced_at.with_timezone(&Utc);

        let mut provider = MockProvider::new();
        provider
            .expect_meetings_since()
            .withf(move |since, _| *since == latest)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let summary = provider_sync(&store, provider)
            .sync(None, &mut EventTrail::start())
            .await?;

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.last_sync_time, latest);
        Ok(())
    }

    #[tokio::test]
    async fn provider_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        let mut provider = MockProvider::new();
        provider.expect_meetings_since().returning(|_, _| {
            Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::TransientUpstream),
            })
        });

        let err = provider_sync(&store, provider)
            .sync(None, &mut EventTrail::start())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::TransientUpstream)
        );
    }

    #[tokio::test]
    async fn non_positive_hours_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut provider = MockProvider::new();
        provider.expect_meetings_since().never();

        let result = provider_sync(&store, provider)
            .sync(Some(0), &mut EventTrail::start())
            .await;

        assert!(result.is_err());
    }
}
