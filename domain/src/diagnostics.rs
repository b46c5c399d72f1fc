//! Read-only snapshot of calls that look unhealthy.

use crate::error::Error;
use crate::store::{AnalysisStore, CallStore, Stores, UnmatchedCallStore};
use crate::Id;
use chrono::{DateTime, FixedOffset, Utc};
use entity_api::call_status::CallStatus;
use entity_api::{calls, unmatched_calls};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// At most this many rows are listed per bucket; `count` is always the full total.
pub const SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSummary {
    pub id: Id,
    pub external_call_id: String,
    pub meeting_title: String,
    pub status: CallStatus,
    pub synced_at: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&calls::Model> for CallSummary {
    fn from(call: &calls::Model) -> Self {
        Self {
            id: call.id,
            external_call_id: call.external_call_id.clone(),
            meeting_title: call.meeting_title.clone(),
            status: call.status,
            synced_at: call.synced_at,
            created_at: call.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedSummary {
    pub id: Id,
    pub external_call_id: String,
    pub meeting_title: String,
    pub participant_emails: Vec<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&unmatched_calls::Model> for UnmatchedSummary {
    fn from(unmatched: &unmatched_calls::Model) -> Self {
        Self {
            id: unmatched.id,
            external_call_id: unmatched.external_call_id.clone(),
            meeting_title: unmatched.meeting_title.clone(),
            participant_emails: unmatched
                .participants
                .iter()
                .map(|participant| participant.email.clone())
                .collect(),
            created_at: unmatched.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<T> {
    pub count: usize,
    pub calls: Vec<T>,
    /// Suspected root cause, present only when the bucket is non-empty.
    pub issue: Option<&'static str>,
}

impl<T> Bucket<T> {
    fn new<'a, S>(rows: &'a [S], issue: &'static str) -> Self
    where
        T: From<&'a S>,
    {
        Self {
            count: rows.len(),
            calls: rows.iter().take(SAMPLE_SIZE).map(T::from).collect(),
            issue: (!rows.is_empty()).then_some(issue),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub analyzing_calls: Bucket<CallSummary>,
    pub no_transcript_calls: Bucket<CallSummary>,
    pub failed_calls: Bucket<CallSummary>,
    pub completed_no_analysis: Bucket<CallSummary>,
    pub unmatched_calls: Bucket<UnmatchedSummary>,
    pub timestamp: DateTime<Utc>,
}

pub struct Diagnostics {
    calls: Arc<dyn CallStore>,
    analyses: Arc<dyn AnalysisStore>,
    unmatched: Arc<dyn UnmatchedCallStore>,
}

impl Diagnostics {
    pub fn new(stores: &Stores) -> Self {
        Self {
            calls: stores.calls.clone(),
            analyses: stores.analyses.clone(),
            unmatched: stores.unmatched.clone(),
        }
    }

    pub async fn snapshot(&self) -> Result<DiagnosticsReport, Error> {
        let analyzing = newest_first(
            self.calls
                .list_calls_by_status(CallStatus::Analyzing, None)
                .await?,
        );
        let no_transcript = newest_first(self.calls.list_calls_missing_transcript(None).await?);
        let failed = newest_first(
            self.calls
                .list_calls_by_status(CallStatus::Failed, None)
                .await?,
        );

        let completed = self
            .calls
            .list_calls_by_status(CallStatus::Completed, None)
            .await?;
        let completed_ids: Vec<Id> = completed.iter().map(|call| call.id).collect();
        let analyzed: HashSet<Id> = if completed_ids.is_empty() {
            HashSet::new()
        } else {
            self.analyses
                .analyses_for_calls(&completed_ids)
                .await?
                .into_iter()
                .map(|analysis| analysis.call_id)
                .collect()
        };
        let completed_no_analysis = newest_first(
            completed
                .into_iter()
                .filter(|call| !analyzed.contains(&call.id))
                .collect(),
        );

        let mut unmatched = self.unmatched.list_unreviewed_unmatched_calls().await?;
        unmatched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(DiagnosticsReport {
            analyzing_calls: Bucket::new(
                &analyzing,
                "Calls stuck in analyzing status - analysis might have failed without updating status",
            ),
            no_transcript_calls: Bucket::new(
                &no_transcript,
                "Calls without transcript - the provider might still be processing or the recording failed",
            ),
            failed_calls: Bucket::new(&failed, "Calls that failed analysis - check logs for errors"),
            completed_no_analysis: Bucket::new(
                &completed_no_analysis,
                "Calls marked completed but have no analysis record",
            ),
            unmatched_calls: Bucket::new(
                &unmatched,
                "Calls with no active sales rep among the participants - awaiting manual review",
            ),
            timestamp: Utc::now(),
        })
    }
}

fn newest_first(mut calls: Vec<calls::Model>) -> Vec<calls::Model> {
    calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;
    use entity_api::json_types::Participants;

    fn call(external_call_id: &str, status: CallStatus, transcript: Option<&str>) -> calls::Model {
        let now = Utc::now().fixed_offset();
        calls::Model {
            id: Id::new_v4(),
            external_call_id: external_call_id.to_string(),
            rep_id: None,
            meeting_title: "Weekly check-in".to_string(),
            transcript: transcript.map(str::to_string),
            recording_url: None,
            participants: Participants::default(),
            start_time: now,
            duration_seconds: 60,
            status,
            team: None,
            error_message: None,
            synced_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn empty_store_reports_no_issues() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());

        let report = Diagnostics::new(&Stores::shared(store)).snapshot().await?;

        assert_eq!(report.analyzing_calls.count, 0);
        assert_eq!(report.analyzing_calls.issue, None);
        assert_eq!(report.completed_no_analysis.count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn unhealthy_calls_land_in_their_buckets() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        store.put_call(call("stuck", CallStatus::Analyzing, Some("text")));
        store.put_call(call("silent", CallStatus::Pending, None));
        store.put_call(call("broken", CallStatus::Failed, Some("text")));
        store.put_call(call("hollow", CallStatus::Completed, Some("text")));

        let report = Diagnostics::new(&Stores::shared(store)).snapshot().await?;

        assert_eq!(report.analyzing_calls.calls[0].external_call_id, "stuck");
        assert_eq!(report.no_transcript_calls.calls[0].external_call_id, "silent");
        assert_eq!(report.failed_calls.count, 1);
        assert_eq!(report.completed_no_analysis.calls[0].external_call_id, "hollow");
        assert!(report.completed_no_analysis.issue.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn buckets_list_a_bounded_sample() -> Result<(), Error> {
        let store = Arc::new(MemoryStore::new());
        for index in 0..15 {
            let mut failed = call(&format!("failed-{index}"), CallStatus::Failed, Some("text"));
            failed.created_at = failed.created_at - Duration::minutes(index);
            store.put_call(failed);
        }

        let report = Diagnostics::new(&Stores::shared(store)).snapshot().await?;

        assert_eq!(report.failed_calls.count, 15);
        assert_eq!(report.failed_calls.calls.len(), SAMPLE_SIZE);
        assert_eq!(report.failed_calls.calls[0].external_call_id, "failed-0");
        Ok(())
    }
}
