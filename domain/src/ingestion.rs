//! The ingestion orchestrator: drives one provider call from receipt to a settled status.
//!
//! A call moves `pending -> analyzing -> {completed | failed}`. Every step runs sequentially
//! and every decision is emitted as a [`DomainEvent`], both into the caller's
//! [`EventTrail`] (for the audit row) and through the [`EventPublisher`] (for logs).
//!
//! While a call is `analyzing` an [`AnalyzingGuard`] is armed. If the ingestion future is
//! dropped or an error escapes before the status is settled, the guard writes the fallback
//! status itself, so the reconciler only has to deal with crashed processes.

use crate::call_classifier::{call_type_for, CallClassifier, ClassifierOutcome};
use crate::call_event::CallEvent;
use crate::error::Error;
use crate::rep_matcher::RepMatcher;
use crate::store::{AnalysisStore, CallStore, RepDirectory, Stores, UnmatchedCallStore};
use crate::Id;
use chrono::Utc;
use entity_api::call_status::CallStatus;
use entity_api::json_types::{Participants, StringList};
use entity_api::{analyses, calls, sales_reps, unmatched_calls};
use events::{DomainEvent, EventPublisher, EventTrail};
use log::*;
use meeting_ai::traits::{analysis, classification};
use meeting_ai::ScoringRequest;
use serde::Serialize;
use serde_json::json;
use service::config::Config;
use std::sync::Arc;

const INTERRUPTED_MESSAGE: &str = "Analysis interrupted before completion";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestionOutcome {
    /// No active rep attended; an unmatched call was stored for review.
    Unmatched,
    /// The matched rep does not own the call's team.
    TeamFiltered { rep_id: Id },
    /// The call already exists and is past `pending`.
    AlreadyProcessed { call_id: Id, status: CallStatus },
    /// The transcript is too short; the call stays `pending`.
    Deferred { call_id: Id },
    /// The classification gate rejected the call.
    Rejected { call_id: Id, analysis_id: Id },
    Completed { call_id: Id, analysis_id: Id },
    Failed { call_id: Id, error: String },
}

impl IngestionOutcome {
    pub fn call_id(&self) -> Option<Id> {
        match self {
            IngestionOutcome::Unmatched | IngestionOutcome::TeamFiltered { .. } => None,
            IngestionOutcome::AlreadyProcessed { call_id, .. }
            | IngestionOutcome::Deferred { call_id }
            | IngestionOutcome::Rejected { call_id, .. }
            | IngestionOutcome::Completed { call_id, .. }
            | IngestionOutcome::Failed { call_id, .. } => Some(*call_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub external_call_id: String,
    /// True when the call already existed and this pass refreshed it.
    pub resynced: bool,
    #[serde(flatten)]
    pub outcome: IngestionOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingRunSummary {
    pub processed: usize,
    pub completed: usize,
    pub rejected: usize,
    pub deferred: usize,
    pub failed: usize,
    pub errors: usize,
}

/// Moves a call out of `analyzing`, or onto `completed` once its analysis exists, if the
/// scope ends before the status was settled.
struct AnalyzingGuard {
    calls: Arc<dyn CallStore>,
    call_id: Id,
    fallback: Option<(CallStatus, Option<String>)>,
}

impl AnalyzingGuard {
    fn arm(calls: Arc<dyn CallStore>, call_id: Id) -> Self {
        Self {
            calls,
            call_id,
            fallback: Some((CallStatus::Failed, Some(INTERRUPTED_MESSAGE.to_string()))),
        }
    }

    /// Armed after a rejection analysis was stored for a `pending` call.
    fn completing(calls: Arc<dyn CallStore>, call_id: Id) -> Self {
        Self {
            calls,
            call_id,
            fallback: Some((CallStatus::Completed, None)),
        }
    }

    /// Once the analysis row exists the right place to land is `completed`.
    fn analysis_stored(&mut self) {
        if self.fallback.is_some() {
            self.fallback = Some((CallStatus::Completed, None));
        }
    }

    fn disarm(&mut self) {
        self.fallback = None;
    }
}

impl Drop for AnalyzingGuard {
    fn drop(&mut self) {
        let Some((status, error_message)) = self.fallback.take() else {
            return;
        };
        let call_id = self.call_id;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Call {call_id} status was not settled, moving it to {status}");
                let calls = self.calls.clone();
                handle.spawn(async move {
                    if let Err(err) = calls.set_call_status(call_id, status, error_message).await {
                        error!("Failed to move call {call_id} to {status}: {err}");
                    }
                });
            }
            Err(_) => error!(
                "Call {call_id} status was not settled and no runtime is available; reconciliation will fix it"
            ),
        }
    }
}

pub struct IngestionOrchestrator {
    reps: Arc<dyn RepDirectory>,
    calls: Arc<dyn CallStore>,
    analyses: Arc<dyn AnalysisStore>,
    unmatched: Arc<dyn UnmatchedCallStore>,
    matcher: RepMatcher,
    classifier: CallClassifier,
    scorer: Option<Arc<dyn analysis::Provider>>,
    publisher: EventPublisher,
    min_transcript_chars: usize,
}

impl IngestionOrchestrator {
    pub fn new(
        config: &Config,
        stores: &Stores,
        classifier: Option<Arc<dyn classification::Provider>>,
        scorer: Option<Arc<dyn analysis::Provider>>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            reps: stores.reps.clone(),
            calls: stores.calls.clone(),
            analyses: stores.analyses.clone(),
            unmatched: stores.unmatched.clone(),
            matcher: RepMatcher::new(stores.reps.clone(), config.rep_match_policy),
            classifier: CallClassifier::new(classifier, config.classifier_prefix_chars),
            scorer,
            publisher,
            min_transcript_chars: config.min_transcript_chars,
        }
    }

    pub fn matcher(&self) -> &RepMatcher {
        &self.matcher
    }

    async fn emit(&self, trail: &mut EventTrail, event: DomainEvent) {
        trail.record(event.clone());
        self.publisher.publish(event).await;
    }

    /// Runs one provider call through matching, persistence and the analysis pipeline.
    pub async fn ingest(
        &self,
        event: CallEvent,
        trail: &mut EventTrail,
    ) -> Result<IngestionReport, Error> {
        let external_call_id = event.external_call_id.clone();
        self.emit(
            trail,
            DomainEvent::CallReceived {
                external_call_id: external_call_id.clone(),
                source: event.source.to_string(),
                transcript_chars: event.transcript_chars(),
            },
        )
        .await;

        if let Some(existing) = self.calls.find_call_by_external_id(&external_call_id).await? {
            let outcome = self.resync(existing, &event, trail).await?;
            return Ok(IngestionReport {
                external_call_id,
                resynced: true,
                outcome,
            });
        }

        let outcome = self.ingest_new(event, trail).await?;
        Ok(IngestionReport {
            external_call_id,
            resynced: false,
            outcome,
        })
    }

    async fn ingest_new(
        &self,
        event: CallEvent,
        trail: &mut EventTrail,
    ) -> Result<IngestionOutcome, Error> {
        let rep_match = self.matcher.match_sales_rep(&event.participants).await?;
        self.emit(
            trail,
            DomainEvent::MatchAttempted {
                external_call_id: event.external_call_id.clone(),
                matched: rep_match.matched,
                rep_id: rep_match.rep_id,
                candidates: rep_match.candidates,
            },
        )
        .await;

        let Some(rep) = rep_match.rep else {
            self.unmatched.insert_unmatched_call(unmatched_call(&event)).await?;
            self.emit(
                trail,
                DomainEvent::CallUnmatched {
                    external_call_id: event.external_call_id.clone(),
                    participant_emails: event.participant_emails(),
                },
            )
            .await;
            return Ok(IngestionOutcome::Unmatched);
        };

        // Only provider sync labels calls with a team; unlabelled calls are never filtered.
        if let Some(team) = event.team.as_deref() {
            let owner = self.team_owner(&event, &rep).await?;
            if !owner.owns_team(Some(team)) {
                self.emit(
                    trail,
                    DomainEvent::TeamFiltered {
                        external_call_id: event.external_call_id.clone(),
                        rep_id: owner.id,
                        team: event.team.clone(),
                    },
                )
                .await;
                return Ok(IngestionOutcome::TeamFiltered { rep_id: owner.id });
            }
        }

        let call = self.calls.upsert_call(new_call(&event, rep.id)).await?;
        // A concurrent ingestion of the same id may already have moved the row on.
        if call.status != CallStatus::Pending {
            return Ok(IngestionOutcome::AlreadyProcessed {
                call_id: call.id,
                status: call.status,
            });
        }

        self.process_call(call, Some(rep.name), trail).await
    }

    /// Refreshes an existing call and re-runs the pipeline only if it is still `pending`.
    async fn resync(
        &self,
        existing: calls::Model,
        event: &CallEvent,
        trail: &mut EventTrail,
    ) -> Result<IngestionOutcome, Error> {
        let transcript = event
            .usable_transcript()
            .map(str::to_string)
            .or_else(|| existing.transcript.clone());
        let team = event.team.clone().or_else(|| existing.team.clone());
        let call = self.calls.resync_call(existing.id, transcript, team).await?;

        if call.status != CallStatus::Pending {
            debug!(
                "Call {} resynced while {}; leaving it alone",
                call.external_call_id, call.status
            );
            return Ok(IngestionOutcome::AlreadyProcessed {
                call_id: call.id,
                status: call.status,
            });
        }

        let rep_name = self.rep_name(&call).await?;
        self.process_call(call, rep_name, trail).await
    }

    /// The rep whose allow-list governs the call's team: the recorder when the provider
    /// names an active one, otherwise the rep matched from the participants.
    async fn team_owner(
        &self,
        event: &CallEvent,
        matched: &sales_reps::Model,
    ) -> Result<sales_reps::Model, Error> {
        let Some(recorder) = &event.recorded_by else {
            return Ok(matched.clone());
        };
        let email = recorder.email.trim().to_lowercase();
        if email.is_empty() || email == matched.email {
            return Ok(matched.clone());
        }

        Ok(self
            .reps
            .find_active_reps_by_emails(std::slice::from_ref(&email))
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| matched.clone()))
    }

    async fn rep_name(&self, call: &calls::Model) -> Result<Option<String>, Error> {
        Ok(match call.rep_id {
            Some(rep_id) => self.reps.find_rep(rep_id).await?.map(|rep| rep.name),
            None => None,
        })
    }

    /// Eligibility, classification and scoring for a `pending` call.
    async fn process_call(
        &self,
        call: calls::Model,
        rep_name: Option<String>,
        trail: &mut EventTrail,
    ) -> Result<IngestionOutcome, Error> {
        let transcript_chars = call.transcript_len();
        if transcript_chars < self.min_transcript_chars {
            self.emit(
                trail,
                DomainEvent::TranscriptDeferred {
                    external_call_id: call.external_call_id.clone(),
                    call_id: call.id,
                    transcript_chars,
                    minimum: self.min_transcript_chars,
                },
            )
            .await;
            return Ok(IngestionOutcome::Deferred { call_id: call.id });
        }

        let transcript = call.transcript.clone().unwrap_or_default();
        let classification = self
            .classifier
            .classify(&transcript, call.participants.len())
            .await;
        self.emit(
            trail,
            DomainEvent::ClassificationCompleted {
                external_call_id: call.external_call_id.clone(),
                call_id: call.id,
                is_sales_call: classification.verdict.is_sales_call,
                call_type: classification.verdict.call_type.as_str().to_string(),
                confidence: classification.verdict.confidence,
                fell_open: classification.fell_open,
            },
        )
        .await;

        if classification.verdict.is_sales_call {
            self.score(call, transcript, rep_name, classification, trail)
                .await
        } else {
            self.reject(call, classification, trail).await
        }
    }

    async fn reject(
        &self,
        call: calls::Model,
        classification: ClassifierOutcome,
        trail: &mut EventTrail,
    ) -> Result<IngestionOutcome, Error> {
        let verdict = &classification.verdict;
        let rejection_reason = verdict
            .rejection_reason
            .clone()
            .unwrap_or_else(|| format!("Classified as {}", verdict.call_type.as_str()));

        let analysis = self
            .analyses
            .insert_analysis(analyses::Model {
                id: Id::new_v4(),
                call_id: call.id,
                framework_score: None,
                sentiment_score: None,
                is_sales_call: false,
                call_type: call_type_for(verdict.call_type),
                confidence_score: verdict.confidence,
                rejection_reason: Some(rejection_reason),
                key_topics: StringList::default(),
                analysis_data: json!({ "classification": classification_data(&classification) }),
                analyzed_at: Utc::now().into(),
            })
            .await?;
        // A failed status write must not leave an analysed call `pending` to be classified again.
        let mut guard = AnalyzingGuard::completing(self.calls.clone(), call.id);
        self.analysis_stored(trail, &analysis).await;

        self.transition(&call, CallStatus::Completed, None, trail)
            .await?;
        guard.disarm();
        Ok(IngestionOutcome::Rejected {
            call_id: call.id,
            analysis_id: analysis.id,
        })
    }

    async fn score(
        &self,
        call: calls::Model,
        transcript: String,
        rep_name: Option<String>,
        classification: ClassifierOutcome,
        trail: &mut EventTrail,
    ) -> Result<IngestionOutcome, Error> {
        let call = self
            .transition(&call, CallStatus::Analyzing, None, trail)
            .await?;
        let mut guard = AnalyzingGuard::arm(self.calls.clone(), call.id);

        let scored = match &self.scorer {
            Some(scorer) => scorer
                .score(ScoringRequest {
                    external_call_id: call.external_call_id.clone(),
                    meeting_title: call.meeting_title.clone(),
                    transcript,
                    rep_name,
                    call_date: call.start_time.with_timezone(&Utc),
                    duration_seconds: call.duration_seconds,
                })
                .await
                .map(|scored| (scored, scorer.provider_id().to_string()))
                .map_err(Error::from),
            None => Err(Error::config("No scoring provider configured")),
        };

        let (scored, scorer_id) = match scored {
            Ok(scored) => scored,
            Err(err) => {
                let outcome = self.fail(&call, err.message(), trail).await?;
                guard.disarm();
                return Ok(outcome);
            }
        };

        let analysis = match self
            .analyses
            .insert_analysis(analyses::Model {
                id: Id::new_v4(),
                call_id: call.id,
                framework_score: Some(scored.bounded_framework_score()),
                sentiment_score: Some(scored.sentiment_or_derived()),
                is_sales_call: true,
                call_type: call_type_for(classification.verdict.call_type),
                confidence_score: classification.verdict.confidence,
                rejection_reason: None,
                key_topics: StringList(scored.capped_key_topics()),
                analysis_data: json!({
                    "scoring": scored.analysis_data,
                    "scoring_provider": scorer_id,
                    "classification": classification_data(&classification),
                }),
                analyzed_at: Utc::now().into(),
            })
            .await
        {
            Ok(analysis) => analysis,
            Err(err) => {
                self.fail(
                    &call,
                    format!("Failed to store analysis: {}", err.message()),
                    trail,
                )
                .await?;
                guard.disarm();
                return Err(err);
            }
        };
        guard.analysis_stored();
        self.analysis_stored(trail, &analysis).await;

        self.transition(&call, CallStatus::Completed, None, trail)
            .await?;
        guard.disarm();

        Ok(IngestionOutcome::Completed {
            call_id: call.id,
            analysis_id: analysis.id,
        })
    }

    async fn fail(
        &self,
        call: &calls::Model,
        error: String,
        trail: &mut EventTrail,
    ) -> Result<IngestionOutcome, Error> {
        self.emit(
            trail,
            DomainEvent::AnalysisFailed {
                external_call_id: call.external_call_id.clone(),
                call_id: call.id,
                error: error.clone(),
            },
        )
        .await;
        self.transition(call, CallStatus::Failed, Some(error.clone()), trail)
            .await?;
        Ok(IngestionOutcome::Failed {
            call_id: call.id,
            error,
        })
    }

    async fn analysis_stored(&self, trail: &mut EventTrail, analysis: &analyses::Model) {
        self.emit(
            trail,
            DomainEvent::AnalysisStored {
                call_id: analysis.call_id,
                analysis_id: analysis.id,
                is_sales_call: analysis.is_sales_call,
                framework_score: analysis.framework_score,
            },
        )
        .await;
    }

    async fn transition(
        &self,
        call: &calls::Model,
        to: CallStatus,
        error_message: Option<String>,
        trail: &mut EventTrail,
    ) -> Result<calls::Model, Error> {
        let updated = self
            .calls
            .set_call_status(call.id, to, error_message)
            .await?;
        self.emit(
            trail,
            DomainEvent::StatusTransitioned {
                external_call_id: call.external_call_id.clone(),
                call_id: call.id,
                from: call.status.to_string(),
                to: to.to_string(),
            },
        )
        .await;
        Ok(updated)
    }

    /// Re-drives one stored call through the pipeline if it is still `pending`.
    pub async fn analyze_call(
        &self,
        call_id: Id,
        trail: &mut EventTrail,
    ) -> Result<IngestionReport, Error> {
        let call = self.calls.find_call(call_id).await?;
        let external_call_id = call.external_call_id.clone();

        let outcome = if call.status == CallStatus::Pending {
            let rep_name = self.rep_name(&call).await?;
            self.process_call(call, rep_name, trail).await?
        } else {
            IngestionOutcome::AlreadyProcessed {
                call_id: call.id,
                status: call.status,
            }
        };

        Ok(IngestionReport {
            external_call_id,
            resynced: false,
            outcome,
        })
    }

    /// Re-drives up to `limit` pending calls, oldest sync first. One failing call never stops the batch.
    /// Every call's events land in `trail`, failures included.
    pub async fn process_pending(
        &self,
        limit: u64,
        trail: &mut EventTrail,
    ) -> Result<PendingRunSummary, Error> {
        let pending = self
            .calls
            .list_calls_by_status(CallStatus::Pending, Some(limit))
            .await?;
        let mut summary = PendingRunSummary::default();

        for call in pending {
            let call_id = call.id;
            let external_call_id = call.external_call_id.clone();
            summary.processed += 1;

            let result = match self.rep_name(&call).await {
                Ok(rep_name) => self.process_call(call, rep_name, trail).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(IngestionOutcome::Completed { .. }) => summary.completed += 1,
                Ok(IngestionOutcome::Rejected { .. }) => summary.rejected += 1,
                Ok(IngestionOutcome::Deferred { .. }) => summary.deferred += 1,
                Ok(IngestionOutcome::Failed { .. }) => summary.failed += 1,
                Ok(_) => {}
                Err(err) => {
                    error!("Failed to process pending call {call_id}: {err}");
                    summary.errors += 1;
                    self.emit(
                        trail,
                        DomainEvent::AnalysisFailed {
                            external_call_id,
                            call_id,
                            error: err.message(),
                        },
                    )
                    .await;
                }
            }
        }

        self.emit(
            trail,
            DomainEvent::ReconciliationCompleted {
                operation: "process_pending".to_string(),
                examined: summary.processed,
                changed: summary.completed + summary.rejected + summary.failed,
            },
        )
        .await;
        Ok(summary)
    }
}

fn classification_data(classification: &ClassifierOutcome) -> serde_json::Value {
    json!({
        "call_type": classification.verdict.call_type.as_str(),
        "confidence": classification.verdict.confidence,
        "reasoning": classification.verdict.reasoning,
        "fell_open": classification.fell_open,
        "provider": classification.provider_id,
    })
}

fn new_call(event: &CallEvent, rep_id: Id) -> calls::Model {
    let now = Utc::now().into();
    calls::Model {
        id: Id::new_v4(),
        external_call_id: event.external_call_id.clone(),
        rep_id: Some(rep_id),
        meeting_title: event.title.clone(),
        transcript: event.usable_transcript().map(str::to_string),
        recording_url: event.recording_url.clone(),
        participants: Participants(event.participants.clone()),
        start_time: event.start_time,
        duration_seconds: event.duration_seconds,
        status: CallStatus::Pending,
        team: event.team.clone(),
        error_message: None,
        synced_at: now,
        created_at: now,
        updated_at: now,
    }
}

fn unmatched_call(event: &CallEvent) -> unmatched_calls::Model {
    unmatched_calls::Model {
        id: Id::new_v4(),
        external_call_id: event.external_call_id.clone(),
        meeting_title: event.title.clone(),
        start_time: event.start_time,
        duration_seconds: event.duration_seconds,
        transcript: event.usable_transcript().map(str::to_string),
        recording_url: event.recording_url.clone(),
        participants: Participants(event.participants.clone()),
        payload: event.raw.clone(),
        reviewed: false,
        created_at: Utc::now().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_event::{IngestSource, RecordedBy};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use entity_api::call_type::CallType;
    use entity_api::json_types::Participant;
    use meeting_ai::{CallCategory, CallClassification, ClassificationRequest, ScoringResult};
    use mockall::mock;
    use std::time::Duration;

    mock! {
        pub Classifier {}

        #[async_trait]
        impl classification::Provider for Classifier {
            async fn classify(
                &self,
                request: ClassificationRequest,
            ) -> Result<CallClassification, meeting_ai::Error>;
            fn provider_id(&self) -> &str;
        }
    }

    mock! {
        pub Scorer {}

        #[async_trait]
        impl analysis::Provider for Scorer {
            async fn score(&self, request: ScoringRequest) -> Result<ScoringResult, meeting_ai::Error>;
            fn provider_id(&self) -> &str;
        }
    }

    /// A scorer that never answers.
    struct HangingScorer;

    #[async_trait]
    impl analysis::Provider for HangingScorer {
        async fn score(&self, _request: ScoringRequest) -> Result<ScoringResult, meeting_ai::Error> {
            std::future::pending().await
        }

        fn provider_id(&self) -> &str {
            "hanging"
        }
    }

    fn classifier(is_sales_call: bool) -> MockClassifier {
        let mut classifier = MockClassifier::new();
        classifier.expect_classify().returning(move |_| {
            Ok(if is_sales_call {
                CallClassification {
                    is_sales_call: true,
                    call_type: CallCategory::SalesCall,
                    confidence: 0.95,
                    reasoning: "Prospect discussing pricing".to_string(),
                    rejection_reason: None,
                }
            } else {
                CallClassification {
                    is_sales_call: false,
                    call_type: CallCategory::TeamMeeting,
                    confidence: 0.9,
                    reasoning: "Internal planning meeting".to_string(),
                    rejection_reason: Some("Weekly team sync, no prospect present".to_string()),
                }
            })
        });
        classifier.expect_provider_id().return_const("mock".to_string());
        classifier
    }

    fn scorer(framework_score: i32) -> MockScorer {
        let mut scorer = MockScorer::new();
        scorer.expect_score().returning(move |_| {
            Ok(ScoringResult {
                framework_score,
                sentiment_score: None,
                key_topics: vec!["pricing".to_string()],
                analysis_data: json!({ "overall_score": framework_score }),
            })
        });
        scorer.expect_provider_id().return_const("mock".to_string());
        scorer
    }

    fn failing_scorer() -> MockScorer {
        let mut scorer = MockScorer::new();
        scorer.expect_score().returning(|_| {
            Err(meeting_ai::Error::RateLimited {
                retry_after_seconds: 0,
            })
        });
        scorer.expect_provider_id().return_const("mock".to_string());
        scorer
    }

    fn orchestrator(
        store: &Arc<MemoryStore>,
        classifier: Option<Arc<dyn classification::Provider>>,
        scorer: Option<Arc<dyn analysis::Provider>>,
    ) -> IngestionOrchestrator {
        IngestionOrchestrator::new(
            &Config::from_defaults(),
            &Stores::shared(store.clone()),
            classifier,
            scorer,
            EventPublisher::new(),
        )
    }

    fn event(external_call_id: &str, emails: &[&str], transcript_chars: usize) -> CallEvent {
        CallEvent {
            source: IngestSource::Webhook,
            external_call_id: external_call_id.to_string(),
            title: "Discovery call".to_string(),
            start_time: DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z").unwrap(),
            duration_seconds: 1800,
            transcript: Some("a".repeat(transcript_chars)),
            recording_url: Some("https://fathom.video/share/1".to_string()),
            participants: emails
                .iter()
                .map(|email| Participant::new("Someone", *email))
                .collect(),
            team: None,
            recorded_by: None,
            raw: json!({ "call_id": external_call_id }),
        }
    }

    fn statuses(trail: &EventTrail) -> Vec<String> {
        trail
            .entries()
            .iter()
            .filter_map(|entry| match &entry.event {
                DomainEvent::StatusTransitioned { to, .. } => Some(to.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn sales_call_is_scored_and_completed() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let jane = store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(scorer(74))),
        );

        let mut trail = EventTrail::start();
        let report = orchestrator
            .ingest(event("abc-1", &["jane@co.com"], 3000), &mut trail)
            .await?;

        let call = store.call_by_external_id("abc-1").unwrap();
        assert_eq!(call.rep_id, Some(jane.id));
        assert_eq!(call.status, CallStatus::Completed);
        assert!(matches!(report.outcome, IngestionOutcome::Completed { .. }));
        assert_eq!(statuses(&trail), vec!["analyzing", "completed"]);

        let analyses = store.analyses_for(call.id);
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].framework_score, Some(74));
        assert_eq!(analyses[0].sentiment_score, Some(80));
        assert_eq!(analyses[0].call_type, CallType::SalesCall);
        Ok(())
    }

    #[tokio::test]
    async fn non_sales_call_is_rejected_without_framework_score() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let mut scorer = MockScorer::new();
        scorer.expect_score().never();
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(false))),
            Some(Arc::new(scorer)),
        );

        let mut trail = EventTrail::start();
        orchestrator
            .ingest(event("abc-2", &["jane@co.com", "bob@co.com"], 500), &mut trail)
            .await?;

        let call = store.call_by_external_id("abc-2").unwrap();
        assert_eq!(call.status, CallStatus::Completed);
        let analyses = store.analyses_for(call.id);
        assert_eq!(analyses.len(), 1);
        assert!(!analyses[0].is_sales_call);
        assert_eq!(analyses[0].framework_score, None);
        assert_eq!(
            analyses[0].rejection_reason.as_deref(),
            Some("Weekly team sync, no prospect present")
        );
        assert_eq!(statuses(&trail), vec!["completed"]);
        Ok(())
    }

    #[tokio::test]
    async fn short_transcript_stays_pending() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let mut classifier = MockClassifier::new();
        classifier.expect_classify().never();
        classifier.expect_provider_id().return_const("mock".to_string());
        let orchestrator = orchestrator(&store, Some(Arc::new(classifier)), None);

        let mut trail = EventTrail::start();
        let report = orchestrator
            .ingest(event("abc-3", &["jane@co.com"], 20), &mut trail)
            .await?;

        assert!(matches!(report.outcome, IngestionOutcome::Deferred { .. }));
        assert_eq!(
            store.call_by_external_id("abc-3").unwrap().status,
            CallStatus::Pending
        );
        assert!(trail.contains("transcript_deferred"));
        assert!(store.analyses().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unmatched_call_is_stored_for_review() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(&store, None, None);

        let mut trail = EventTrail::start();
        let report = orchestrator
            .ingest(event("abc-4", &["lead@y.com"], 3000), &mut trail)
            .await?;

        assert_eq!(report.outcome, IngestionOutcome::Unmatched);
        assert!(store.calls().is_empty());
        let unmatched = store.unmatched();
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].payload, json!({ "call_id": "abc-4" }));
        assert!(trail.contains("call_unmatched"));
        Ok(())
    }

    #[tokio::test]
    async fn team_allow_list_filters_calls() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let sam = store.add_rep("Sam", "sam@co.com", &["Enterprise"]);
        let orchestrator = orchestrator(&store, None, None);

        let mut other_team = event("abc-5", &["sam@co.com"], 3000);
        other_team.team = Some("SMB".to_string());
        let report = orchestrator
            .ingest(other_team, &mut EventTrail::start())
            .await?;

        assert_eq!(report.outcome, IngestionOutcome::TeamFiltered { rep_id: sam.id });
        assert!(store.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unlabelled_call_is_not_team_filtered() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let sam = store.add_rep("Sam", "sam@co.com", &["Enterprise"]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(scorer(70))),
        );

        let mut trail = EventTrail::start();
        let report = orchestrator
            .ingest(event("abc-5b", &["sam@co.com"], 3000), &mut trail)
            .await?;

        assert!(matches!(report.outcome, IngestionOutcome::Completed { .. }));
        assert!(!trail.contains("team_filtered"));
        let call = store.call_by_external_id("abc-5b").unwrap();
        assert_eq!(call.rep_id, Some(sam.id));
        assert_eq!(call.status, CallStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn team_filter_uses_the_recorders_allow_list() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let sam = store.add_rep("Sam", "sam@co.com", &["Enterprise"]);
        let orchestrator = orchestrator(&store, None, None);

        let mut synced = event("abc-5c", &["jane@co.com", "sam@co.com"], 3000);
        synced.source = IngestSource::Sync;
        synced.team = Some("SMB".to_string());
        synced.recorded_by = Some(RecordedBy {
            name: "Sam".to_string(),
            email: "Sam@co.com".to_string(),
            team: Some("SMB".to_string()),
        });
        let report = orchestrator.ingest(synced, &mut EventTrail::start()).await?;

        assert_eq!(report.outcome, IngestionOutcome::TeamFiltered { rep_id: sam.id });
        assert!(store.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_delivery_creates_one_call() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(scorer(60))),
        );

        orchestrator
            .ingest(event("abc-6", &["jane@co.com"], 3000), &mut EventTrail::start())
            .await?;
        let second = orchestrator
            .ingest(event("abc-6", &["jane@co.com"], 3000), &mut EventTrail::start())
            .await?;

        assert!(second.resynced);
        assert!(matches!(
            second.outcome,
            IngestionOutcome::AlreadyProcessed {
                status: CallStatus::Completed,
                ..
            }
        ));
        assert_eq!(store.calls().len(), 1);
        assert_eq!(store.analyses().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn resync_with_full_transcript_completes_deferred_call() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(scorer(55))),
        );

        let mut first = event("abc-7", &["jane@co.com"], 0);
        first.transcript = None;
        orchestrator.ingest(first, &mut EventTrail::start()).await?;
        assert_eq!(
            store.call_by_external_id("abc-7").unwrap().status,
            CallStatus::Pending
        );

        let report = orchestrator
            .ingest(event("abc-7", &["jane@co.com"], 3000), &mut EventTrail::start())
            .await?;

        assert!(report.resynced);
        assert!(matches!(report.outcome, IngestionOutcome::Completed { .. }));
        assert_eq!(store.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn scoring_failure_marks_call_failed() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(failing_scorer())),
        );

        let mut trail = EventTrail::start();
        let report = orchestrator
            .ingest(event("abc-8", &["jane@co.com"], 3000), &mut trail)
            .await?;

        let call = store.call_by_external_id("abc-8").unwrap();
        assert_eq!(call.status, CallStatus::Failed);
        assert!(call.error_message.is_some());
        assert!(matches!(report.outcome, IngestionOutcome::Failed { .. }));
        assert_eq!(statuses(&trail), vec!["analyzing", "failed"]);
        assert!(store.analyses().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn analysis_write_failure_never_completes_the_call() {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        store.fail_analysis_inserts(true);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(scorer(80))),
        );

        let result = orchestrator
            .ingest(event("abc-9", &["jane@co.com"], 3000), &mut EventTrail::start())
            .await;

        assert!(result.is_err());
        assert_eq!(
            store.call_by_external_id("abc-9").unwrap().status,
            CallStatus::Failed
        );
    }

    #[tokio::test]
    async fn rejected_call_lands_completed_when_status_write_fails() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(&store, Some(Arc::new(classifier(false))), None);
        store.fail_next_status_writes(1);

        let result = orchestrator
            .ingest(event("abc-9b", &["jane@co.com"], 3000), &mut EventTrail::start())
            .await;
        assert!(result.is_err());

        // Let the guard's spawned write run.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let call = store.call_by_external_id("abc-9b").unwrap();
        assert_eq!(call.status, CallStatus::Completed);

        let summary = orchestrator.process_pending(10, &mut EventTrail::start()).await?;
        assert_eq!(summary.processed, 0);
        assert_eq!(store.analyses_for(call.id).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn dropped_ingestion_does_not_leave_call_analyzing() {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(HangingScorer)),
        );

        let mut trail = EventTrail::start();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.ingest(event("abc-10", &["jane@co.com"], 3000), &mut trail),
        )
        .await;
        assert!(timed_out.is_err());

        // Let the guard's spawned write run.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let call = store.call_by_external_id("abc-10").unwrap();
        assert_eq!(call.status, CallStatus::Failed);
        assert_eq!(call.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
    }

    #[tokio::test]
    async fn classifier_failure_fails_open_into_scoring() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let mut classifier = MockClassifier::new();
        classifier
            .expect_classify()
            .returning(|_| Err(meeting_ai::Error::Network("unreachable".to_string())));
        classifier.expect_provider_id().return_const("mock".to_string());
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier)),
            Some(Arc::new(scorer(65))),
        );

        let mut trail = EventTrail::start();
        orchestrator
            .ingest(event("abc-11", &["jane@co.com"], 3000), &mut trail)
            .await?;

        let call = store.call_by_external_id("abc-11").unwrap();
        assert_eq!(call.status, CallStatus::Completed);
        assert_eq!(store.analyses_for(call.id)[0].call_type, CallType::Unknown);
        assert!(trail.entries().iter().any(|entry| matches!(
            entry.event,
            DomainEvent::ClassificationCompleted {
                fell_open: true,
                ..
            }
        )));
        Ok(())
    }

    #[tokio::test]
    async fn process_pending_drives_stored_calls() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let orchestrator = orchestrator(
            &store,
            Some(Arc::new(classifier(true))),
            Some(Arc::new(scorer(90))),
        );

        orchestrator
            .ingest(event("abc-12", &["jane@co.com"], 10), &mut EventTrail::start())
            .await?;
        let call = store.call_by_external_id("abc-12").unwrap();
        store.put_call(calls::Model {
            transcript: Some("b".repeat(400)),
            ..call
        });

        let mut trail = EventTrail::start();
        let summary = orchestrator.process_pending(10, &mut trail).await?;

        assert_eq!(
            summary,
            PendingRunSummary {
                processed: 1,
                completed: 1,
                ..Default::default()
            }
        );
        assert_eq!(statuses(&trail), vec!["analyzing", "completed"]);
        assert!(trail.contains("reconciliation_completed"));
        Ok(())
    }
}
