//! Local-state repair for calls left in an inconsistent status.
//!
//! Nothing here talks to the provider or the reasoning engine. Every operation reads and
//! rewrites Call/Analysis rows only, and re-running one when nothing qualifies is a no-op.

use crate::error::Error;
use crate::store::{AnalysisStore, CallStore, Stores};
use crate::Id;
use chrono::{Duration as ChronoDuration, Utc};
use entity_api::call_status::CallStatus;
use entity_api::{analyses, calls};
use events::{DomainEvent, EventPublisher, EventTrail};
use log::*;
use serde::Serialize;
use service::config::Config;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckReconciliation {
    /// Calls with an analysis that were moved to `completed`.
    pub fixed: usize,
    pub reset_to_pending: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetCall {
    pub id: Id,
    pub external_call_id: String,
    pub meeting_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForceReset {
    pub reset: usize,
    pub calls: Vec<ResetCall>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteReset {
    pub total_processed: usize,
    pub fixed_to_completed: usize,
    pub reset_to_pending: usize,
    pub already_correct: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDedupe {
    pub calls_affected: usize,
    pub removed: u64,
}

pub struct StatusReconciler {
    calls: Arc<dyn CallStore>,
    analyses: Arc<dyn AnalysisStore>,
    publisher: EventPublisher,
    stuck_threshold: Duration,
}

impl StatusReconciler {
    pub fn new(config: &Config, stores: &Stores, publisher: EventPublisher) -> Self {
        Self {
            calls: stores.calls.clone(),
            analyses: stores.analyses.clone(),
            publisher,
            stuck_threshold: config.stuck_threshold(),
        }
    }

    /// Settles `analyzing` calls whose last status write is older than the stuck threshold.
    pub async fn reconcile_stuck(
        &self,
        trail: &mut EventTrail,
    ) -> Result<StuckReconciliation, Error> {
        let threshold = ChronoDuration::from_std(self.stuck_threshold)
            .map_err(|_| Error::config("Stuck threshold out of range"))?;
        let cutoff = (Utc::now() - threshold).fixed_offset();
        let stuck = self
            .calls
            .list_calls_synced_before(CallStatus::Analyzing, cutoff)
            .await?;

        let analyzed = self.analyzed_call_ids(&stuck).await?;
        let mut summary = StuckReconciliation::default();

        for call in &stuck {
            if analyzed.contains(&call.id) {
                self.rewrite(call, CallStatus::Completed, trail).await?;
                summary.fixed += 1;
            } else {
                self.rewrite(call, CallStatus::Pending, trail).await?;
                summary.reset_to_pending += 1;
            }
        }

        self.completed(
            trail,
            "reconcile_stuck",
            stuck.len(),
            summary.fixed + summary.reset_to_pending,
        )
        .await;
        Ok(summary)
    }

    /// Moves every `analyzing` call to `pending`, regardless of age.
    pub async fn force_reset_all(&self, trail: &mut EventTrail) -> Result<ForceReset, Error> {
        let analyzing = self
            .calls
            .list_calls_by_status(CallStatus::Analyzing, None)
            .await?;
        warn!("Force-resetting {} analyzing calls to pending", analyzing.len());

        let mut reset = ForceReset::default();
        for call in analyzing {
            self.rewrite(&call, CallStatus::Pending, trail).await?;
            reset.calls.push(ResetCall {
                id: call.id,
                external_call_id: call.external_call_id,
                meeting_title: call.meeting_title,
            });
        }
        reset.reset = reset.calls.len();

        self.completed(trail, "force_reset_all", reset.reset, reset.reset)
            .await;
        Ok(reset)
    }

    /// Re-derives every call's status from whether an analysis exists for it.
    pub async fn complete_reset(&self, trail: &mut EventTrail) -> Result<CompleteReset, Error> {
        let all_calls = self.calls.list_all_calls().await?;
        let analyzed: HashSet<Id> = self
            .analyses
            .all_analyses()
            .await?
            .into_iter()
            .map(|analysis| analysis.call_id)
            .collect();

        let mut summary = CompleteReset {
            total_processed: all_calls.len(),
            ..Default::default()
        };

        for call in &all_calls {
            let correct = if analyzed.contains(&call.id) {
                CallStatus::Completed
            } else {
                CallStatus::Pending
            };
            if call.status == correct {
                summary.already_correct += 1;
                continue;
            }

            self.rewrite(call, correct, trail).await?;
            match correct {
                CallStatus::Completed => summary.fixed_to_completed += 1,
                _ => summary.reset_to_pending += 1,
            }
        }

        self.completed(
            trail,
            "complete_reset",
            summary.total_processed,
            summary.fixed_to_completed + summary.reset_to_pending,
        )
        .await;
        Ok(summary)
    }

    /// Keeps only the most recent analysis (by `analyzed_at`) per call.
    pub async fn dedupe_analyses(&self, trail: &mut EventTrail) -> Result<AnalysisDedupe, Error> {
        let mut by_call: HashMap<Id, Vec<analyses::Model>> = HashMap::new();
        for analysis in self.analyses.all_analyses().await? {
            by_call.entry(analysis.call_id).or_default().push(analysis);
        }

        let mut calls_affected = 0;
        let mut redundant = Vec::new();
        for (_, mut analyses) in by_call.into_iter().filter(|(_, group)| group.len() > 1) {
            calls_affected += 1;
            analyses.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
            redundant.extend(analyses.into_iter().skip(1).map(|analysis| analysis.id));
        }

        let removed = if redundant.is_empty() {
            0
        } else {
            self.analyses.delete_analyses(&redundant).await?
        };
        info!("Removed {removed} duplicate analyses across {calls_affected} calls");

        self.completed(trail, "dedupe_analyses", calls_affected, removed as usize)
            .await;
        Ok(AnalysisDedupe {
            calls_affected,
            removed,
        })
    }

    async fn analyzed_call_ids(&self, calls: &[calls::Model]) -> Result<HashSet<Id>, Error> {
        if calls.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Id> = calls.iter().map(|call| call.id).collect();
        Ok(self
            .analyses
            .analyses_for_calls(&ids)
            .await?
            .into_iter()
            .map(|analysis| analysis.call_id)
            .collect())
    }

    async fn emit(&self, trail: &mut EventTrail, event: DomainEvent) {
        trail.record(event.clone());
        self.publisher.publish(event).await;
    }

    async fn rewrite(
        &self,
        call: &calls::Model,
        to: CallStatus,
        trail: &mut EventTrail,
    ) -> Result<(), Error> {
        self.calls.set_call_status(call.id, to, None).await?;
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
        Ok(())
    }

    async fn completed(
        &self,
        trail: &mut EventTrail,
        operation: &str,
        examined: usize,
        changed: usize,
    ) {
        self.emit(
            trail,
            DomainEvent::ReconciliationCompleted {
                operation: operation.to_string(),
                examined,
                changed,
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::DateTime;
    use entity_api::call_type::CallType;
    use entity_api::json_types::{Participants, StringList};
    use serde_json::json;

    fn call(external_call_id: &str, status: CallStatus, synced_secs_ago: i64) -> calls::Model {
        let synced_at = (Utc::now() - ChronoDuration::seconds(synced_secs_ago)).fixed_offset();
        calls::Model {
            id: Id::new_v4(),
            external_call_id: external_call_id.to_string(),
            rep_id: None,
            meeting_title: format!("Call {external_call_id}"),
            transcript: Some("transcript".to_string()),
            recording_url: None,
            participants: Participants::default(),
            start_time: DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z").unwrap(),
            duration_seconds: 600,
            status,
            team: None,
            error_message: None,
            synced_at,
            created_at: synced_at,
            updated_at: synced_at,
        }
    }

    fn analysis(call_id: Id, analyzed_secs_ago: i64) -> analyses::Model {
        analyses::Model {
            id: Id::new_v4(),
            call_id,
            framework_score: Some(70),
            sentiment_score: Some(80),
            is_sales_call: true,
            call_type: CallType::SalesCall,
            confidence_score: 0.9,
            rejection_reason: None,
            key_topics: StringList::default(),
            analysis_data: json!({}),
            analyzed_at: (Utc::now() - ChronoDuration::seconds(analyzed_secs_ago)).fixed_offset(),
        }
    }

    fn reconciler(store: &Arc<MemoryStore>) -> StatusReconciler {
        StatusReconciler::new(
            &Config::from_defaults(),
            &Stores::shared(store.clone()),
            EventPublisher::new(),
        )
    }

    fn status_of(store: &MemoryStore, external_call_id: &str) -> CallStatus {
        store.call_by_external_id(external_call_id).unwrap().status
    }

    #[tokio::test]
    async fn reconcile_stuck_respects_threshold() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let analyzed = call("analyzed", CallStatus::Analyzing, 180);
        store.put_analysis(analysis(analyzed.id, 170));
        store.put_call(analyzed);
        store.put_call(call("orphaned", CallStatus::Analyzing, 180));
        store.put_call(call("recent", CallStatus::Analyzing, 30));

        let mut trail = EventTrail::start();
        let summary = reconciler(&store).reconcile_stuck(&mut trail).await?;

        assert_eq!(
            summary,
            StuckReconciliation {
                fixed: 1,
                reset_to_pending: 1
            }
        );
        let transitions = trail
            .entries()
            .iter()
            .filter(|entry| matches!(entry.event, DomainEvent::StatusTransitioned { .. }))
            .count();
        assert_eq!(transitions, 2);
        assert!(trail.contains("reconciliation_completed"));
        assert_eq!(status_of(&store, "analyzed"), CallStatus::Completed);
        assert_eq!(status_of(&store, "orphaned"), CallStatus::Pending);
        assert_eq!(status_of(&store, "recent"), CallStatus::Analyzing);
        Ok(())
    }

    #[tokio::test]
    async fn reconcile_stuck_is_a_no_op_when_nothing_qualifies() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.put_call(call("done", CallStatus::Completed, 600));

        let summary = reconciler(&store).reconcile_stuck(&mut EventTrail::start()).await?;

        assert_eq!(summary, StuckReconciliation::default());
        assert_eq!(status_of(&store, "done"), CallStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn force_reset_ignores_age() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.put_call(call("recent", CallStatus::Analyzing, 30));
        store.put_call(call("failed", CallStatus::Failed, 30));

        let reset = reconciler(&store).force_reset_all(&mut EventTrail::start()).await?;

        assert_eq!(reset.reset, 1);
        assert_eq!(reset.calls[0].external_call_id, "recent");
        assert_eq!(status_of(&store, "recent"), CallStatus::Pending);
        assert_eq!(status_of(&store, "failed"), CallStatus::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn complete_reset_derives_status_from_analyses() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let failed_with_analysis = call("a", CallStatus::Failed, 60);
        store.put_analysis(analysis(failed_with_analysis.id, 60));
        store.put_call(failed_with_analysis);
        store.put_call(call("b", CallStatus::Completed, 60));
        store.put_call(call("c", CallStatus::Pending, 60));

        let summary = reconciler(&store).complete_reset(&mut EventTrail::start()).await?;

        assert_eq!(
            summary,
            CompleteReset {
                total_processed: 3,
                fixed_to_completed: 1,
                reset_to_pending: 1,
                already_correct: 1,
            }
        );
        assert_eq!(status_of(&store, "a"), CallStatus::Completed);
        assert_eq!(status_of(&store, "b"), CallStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn dedupe_keeps_most_recent_analysis() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        let duplicated = call("dup", CallStatus::Completed, 60);
        let newest = analysis(duplicated.id, 5);
        store.put_analysis(analysis(duplicated.id, 50));
        store.put_analysis(newest.clone());
        store.put_analysis(analysis(duplicated.id, 30));
        let single = call("single", CallStatus::Completed, 60);
        store.put_analysis(analysis(single.id, 10));
        store.put_call(duplicated.clone());
        store.put_call(single);

        let dedupe = reconciler(&store).dedupe_analyses(&mut EventTrail::start()).await?;

        assert_eq!(
            dedupe,
            AnalysisDedupe {
                calls_affected: 1,
                removed: 2
            }
        );
        assert_eq!(store.analyses_for(duplicated.id), vec![newest]);
        assert_eq!(store.analyses().len(), 2);
        Ok(())
    }
}
