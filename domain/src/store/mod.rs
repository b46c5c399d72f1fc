//! Narrow persistence capabilities used by the pipeline components.
//!
//! Each component holds an `Arc<dyn ...>` for exactly the capabilities it touches, so the
//! rep matcher can only read reps and the reconciler can never write an unmatched call.
//! [`DbStore`] implements every trait on top of `entity_api`.

use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use entity_api::call_status::CallStatus;
use entity_api::{analyses, calls, sales_reps, unmatched_calls, webhook_logs};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

mod db;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use db::DbStore;

#[async_trait]
pub trait RepDirectory: Send + Sync {
    /// Active reps whose email is in `emails` (already lower-cased), in lookup order.
    async fn find_active_reps_by_emails(
        &self,
        emails: &[String],
    ) -> Result<Vec<sales_reps::Model>, Error>;

    async fn find_rep(&self, id: Id) -> Result<Option<sales_reps::Model>, Error>;
}

#[async_trait]
pub trait CallStore: Send + Sync {
    async fn find_call(&self, id: Id) -> Result<calls::Model, Error>;

    async fn find_call_by_external_id(
        &self,
        external_call_id: &str,
    ) -> Result<Option<calls::Model>, Error>;

    /// Insert keyed on `external_call_id`; an existing row only has its mutable fields refreshed.
    async fn upsert_call(&self, call: calls::Model) -> Result<calls::Model, Error>;

    async fn resync_call(
        &self,
        id: Id,
        transcript: Option<String>,
        team: Option<String>,
    ) -> Result<calls::Model, Error>;

    /// Writes `status` and bumps `synced_at`.
    async fn set_call_status(
        &self,
        id: Id,
        status: CallStatus,
        error_message: Option<String>,
    ) -> Result<calls::Model, Error>;

    async fn list_calls_by_status(
        &self,
        status: CallStatus,
        limit: Option<u64>,
    ) -> Result<Vec<calls::Model>, Error>;

    async fn list_calls_synced_before(
        &self,
        status: CallStatus,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Vec<calls::Model>, Error>;

    async fn list_calls_missing_transcript(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<calls::Model>, Error>;

    async fn list_all_calls(&self) -> Result<Vec<calls::Model>, Error>;

    async fn latest_call_sync(&self) -> Result<Option<DateTime<FixedOffset>>, Error>;
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_analysis(&self, analysis: analyses::Model) -> Result<analyses::Model, Error>;

    async fn analyses_for_calls(&self, call_ids: &[Id]) -> Result<Vec<analyses::Model>, Error>;

    async fn all_analyses(&self) -> Result<Vec<analyses::Model>, Error>;

    async fn delete_analyses(&self, ids: &[Id]) -> Result<u64, Error>;
}

#[async_trait]
pub trait UnmatchedCallStore: Send + Sync {
    async fn insert_unmatched_call(
        &self,
        unmatched: unmatched_calls::Model,
    ) -> Result<unmatched_calls::Model, Error>;

    async fn list_unreviewed_unmatched_calls(&self)
        -> Result<Vec<unmatched_calls::Model>, Error>;
}

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append_webhook_log(
        &self,
        log: webhook_logs::Model,
    ) -> Result<webhook_logs::Model, Error>;
}

/// One handle per capability, usually all pointing at the same backing store.
#[derive(Clone)]
pub struct Stores {
    pub reps: Arc<dyn RepDirectory>,
    pub calls: Arc<dyn CallStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub unmatched: Arc<dyn UnmatchedCallStore>,
    pub audit: Arc<dyn AuditLogStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: RepDirectory + CallStore + AnalysisStore + UnmatchedCallStore + AuditLogStore + 'static,
    {
        Self {
            reps: store.clone(),
            calls: store.clone(),
            analyses: store.clone(),
            unmatched: store.clone(),
            audit: store,
        }
    }

    pub fn from_db(db: Arc<DatabaseConnection>) -> Self {
        Self::shared(Arc::new(DbStore::new(db)))
    }
}
