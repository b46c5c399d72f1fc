//! In-memory implementation of every store capability, for tests.

use super::{AnalysisStore, AuditLogStore, CallStore, RepDirectory, UnmatchedCallStore};
use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use entity_api::call_status::CallStatus;
use entity_api::json_types::StringList;
use entity_api::{analyses, calls, sales_reps, unmatched_calls, webhook_logs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    reps: Vec<sales_reps::Model>,
    calls: Vec<calls::Model>,
    analyses: Vec<analyses::Model>,
    unmatched: Vec<unmatched_calls::Model>,
    logs: Vec<webhook_logs::Model>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_analysis_inserts: AtomicBool,
    fail_audit_writes: AtomicBool,
    failing_status_writes: AtomicUsize,
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

fn persistence_failure(table: &str) -> Error {
    Error {
        source: Some(format!("{table} unavailable").into()),
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
            EntityErrorKind::DbTransaction,
        )),
    }
}

fn not_found() -> Error {
    Error {
        source: None,
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound)),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panicking test poisons the lock; the data is still usable for the remaining assertions.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_rep(&self, name: &str, email: &str, teams: &[&str]) -> sales_reps::Model {
        let rep = sales_reps::Model {
            id: Id::new_v4(),
            name: name.to_string(),
            email: email.to_lowercase(),
            teams: StringList(teams.iter().map(|team| team.to_string()).collect()),
            archived_at: None,
            created_at: now(),
            updated_at: now(),
        };
        self.tables().reps.push(rep.clone());
        rep
    }

    pub fn archive_rep(&self, id: Id) {
        if let Some(rep) = self.tables().reps.iter_mut().find(|rep| rep.id == id) {
            rep.archived_at = Some(now());
        }
    }

    /// Stores `call` exactly as given, `synced_at` included.
    pub fn put_call(&self, call: calls::Model) {
        let mut tables = self.tables();
        tables.calls.retain(|existing| existing.id != call.id);
        tables.calls.push(call);
    }

    /// Stores `analysis` exactly as given, `analyzed_at` included.
    pub fn put_analysis(&self, analysis: analyses::Model) {
        self.tables().analyses.push(analysis);
    }

    pub fn fail_analysis_inserts(&self, fail: bool) {
        self.fail_analysis_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// The next `count` status writes fail; later ones succeed again.
    pub fn fail_next_status_writes(&self, count: usize) {
        self.failing_status_writes.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<calls::Model> {
        self.tables().calls.clone()
    }

    pub fn call_by_external_id(&self, external_call_id: &str) -> Option<calls::Model> {
        self.tables()
            .calls
            .iter()
            .find(|call| call.external_call_id == external_call_id)
            .cloned()
    }

    pub fn analyses(&self) -> Vec<analyses::Model> {
        self.tables().analyses.clone()
    }

    pub fn analyses_for(&self, call_id: Id) -> Vec<analyses::Model> {
        self.tables()
            .analyses
            .iter()
            .filter(|analysis| analysis.call_id == call_id)
            .cloned()
            .collect()
    }

    pub fn unmatched(&self) -> Vec<unmatched_calls::Model> {
        self.tables().unmatched.clone()
    }

    pub fn webhook_logs(&self) -> Vec<webhook_logs::Model> {
        self.tables().logs.clone()
    }
}

#[async_trait]
impl RepDirectory for MemoryStore {
    async fn find_active_reps_by_emails(
        &self,
        emails: &[String],
    ) -> Result<Vec<sales_reps::Model>, Error> {
        Ok(self
            .tables()
            .reps
            .iter()
            .filter(|rep| rep.is_active() && emails.contains(&rep.email))
            .cloned()
            .collect())
    }

    async fn find_rep(&self, id: Id) -> Result<Option<sales_reps::Model>, Error> {
        Ok(self.tables().reps.iter().find(|rep| rep.id == id).cloned())
    }
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn find_call(&self, id: Id) -> Result<calls::Model, Error> {
        self.tables()
            .calls
            .iter()
            .find(|call| call.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn find_call_by_external_id(
        &self,
        external_call_id: &str,
    ) -> Result<Option<calls::Model>, Error> {
        Ok(self.call_by_external_id(external_call_id))
    }

    async fn upsert_call(&self, model: calls::Model) -> Result<calls::Model, Error> {
        let mut tables = self.tables();
        let stamp = now();
        if let Some(existing) = tables
            .calls
            .iter_mut()
            .find(|call| call.external_call_id == model.external_call_id)
        {
            existing.transcript = model.transcript;
            existing.team = model.team;
            existing.synced_at = stamp;
            existing.updated_at = stamp;
            return Ok(existing.clone());
        }

        let call = calls::Model {
            id: Id::new_v4(),
            error_message: None,
            synced_at: stamp,
            created_at: stamp,
            updated_at: stamp,
            ..model
        };
        tables.calls.push(call.clone());
        Ok(call)
    }

    async fn resync_call(
        &self,
        id: Id,
        transcript: Option<String>,
        team: Option<String>,
    ) -> Result<calls::Model, Error> {
        let mut tables = self.tables();
        let call = tables
            .calls
            .iter_mut()
            .find(|call| call.id == id)
            .ok_or_else(not_found)?;
        call.transcript = transcript;
        call.team = team;
        call.synced_at = now();
        call.updated_at = call.synced_at;
        Ok(call.clone())
    }

    async fn set_call_status(
        &self,
        id: Id,
        status: CallStatus,
        error_message: Option<String>,
    ) -> Result<calls::Model, Error> {
        if self
            .failing_status_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(persistence_failure("calls"));
        }
        let mut tables = self.tables();
        let call = tables
            .calls
            .iter_mut()
            .find(|call| call.id == id)
            .ok_or_else(not_found)?;
        call.status = status;
        call.error_message = error_message;
        call.synced_at = now();
        call.updated_at = call.synced_at;
        Ok(call.clone())
    }

    async fn list_calls_by_status(
        &self,
        status: CallStatus,
        limit: Option<u64>,
    ) -> Result<Vec<calls::Model>, Error> {
        let mut matching: Vec<calls::Model> = self
            .tables()
            .calls
            .iter()
            .filter(|call| call.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|call| call.synced_at);
        if let Some(limit) = limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }

    async fn list_calls_synced_before(
        &self,
        status: CallStatus,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Vec<calls::Model>, Error> {
        Ok(self
            .list_calls_by_status(status, None)
            .await?
            .into_iter()
            .filter(|call| call.synced_at < cutoff)
            .collect())
    }

    async fn list_calls_missing_transcript(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<calls::Model>, Error> {
        let mut missing: Vec<calls::Model> = self
            .tables()
            .calls
            .iter()
            .filter(|call| call.transcript.as_deref().unwrap_or("").is_empty())
            .cloned()
            .collect();
        if let Some(limit) = limit {
            missing.truncate(limit as usize);
        }
        Ok(missing)
    }

    async fn list_all_calls(&self) -> Result<Vec<calls::Model>, Error> {
        Ok(self.calls())
    }

    async fn latest_call_sync(&self) -> Result<Option<DateTime<FixedOffset>>, Error> {
        Ok(self.tables().calls.iter().map(|call| call.synced_at).max())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert_analysis(&self, model: analyses::Model) -> Result<analyses::Model, Error> {
        if self.fail_analysis_inserts.load(Ordering::SeqCst) {
            return Err(persistence_failure("analyses"));
        }
        let analysis = analyses::Model {
            id: Id::new_v4(),
            analyzed_at: now(),
            ..model
        };
        self.tables().analyses.push(analysis.clone());
        Ok(analysis)
    }

    async fn analyses_for_calls(&self, call_ids: &[Id]) -> Result<Vec<analyses::Model>, Error> {
        Ok(self
            .tables()
            .analyses
            .iter()
            .filter(|analysis| call_ids.contains(&analysis.call_id))
            .cloned()
            .collect())
    }

    async fn all_analyses(&self) -> Result<Vec<analyses::Model>, Error> {
        Ok(self.analyses())
    }

    async fn delete_analyses(&self, ids: &[Id]) -> Result<u64, Error> {
        let mut tables = self.tables();
        let before = tables.analyses.len();
        tables.analyses.retain(|analysis| !ids.contains(&analysis.id));
        Ok((before - tables.analyses.len()) as u64)
    }
}

#[async_trait]
impl UnmatchedCallStore for MemoryStore {
    async fn insert_unmatched_call(
        &self,
        model: unmatched_calls::Model,
    ) -> Result<unmatched_calls::Model, Error> {
        let unmatched = unmatched_calls::Model {
            id: Id::new_v4(),
            reviewed: false,
            created_at: now(),
            ..model
        };
        self.tables().unmatched.push(unmatched.clone());
        Ok(unmatched)
    }

    async fn list_unreviewed_unmatched_calls(
        &self,
    ) -> Result<Vec<unmatched_calls::Model>, Error> {
        Ok(self
            .tables()
            .unmatched
            .iter()
            .filter(|unmatched| !unmatched.reviewed)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditLogStore for MemoryStore {
    async fn append_webhook_log(
        &self,
        model: webhook_logs::Model,
    ) -> Result<webhook_logs::Model, Error> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(persistence_failure("webhook_logs"));
        }
        let log = webhook_logs::Model {
            id: Id::new_v4(),
            created_at: now(),
            ..model
        };
        self.tables().logs.push(log.clone());
        Ok(log)
    }
}
