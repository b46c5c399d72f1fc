use super::{AnalysisStore, AuditLogStore, CallStore, RepDirectory, UnmatchedCallStore};
use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use entity_api::call_status::CallStatus;
use entity_api::{
    analyses, analysis, call, calls, sales_rep, sales_reps, unmatched_call, unmatched_calls,
    webhook_log, webhook_logs,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Every store capability backed by the Postgres connection pool.
#[derive(Clone)]
pub struct DbStore {
    db: Arc<DatabaseConnection>,
}

impl DbStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RepDirectory for DbStore {
    async fn find_active_reps_by_emails(
        &self,
        emails: &[String],
    ) -> Result<Vec<sales_reps::Model>, Error> {
        Ok(sales_rep::find_active_by_emails(&self.db, emails).await?)
    }

    async fn find_rep(&self, id: Id) -> Result<Option<sales_reps::Model>, Error> {
        match sales_rep::find_by_id(&self.db, id).await {
            Ok(rep) => Ok(Some(rep)),
            Err(err) if err.error_kind == entity_api::error::EntityApiErrorKind::RecordNotFound => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl CallStore for DbStore {
    async fn find_call(&self, id: Id) -> Result<calls::Model, Error> {
        Ok(call::find_by_id(&self.db, id).await?)
    }

    async fn find_call_by_external_id(
        &self,
        external_call_id: &str,
    ) -> Result<Option<calls::Model>, Error> {
        Ok(call::find_by_external_id(&self.db, external_call_id).await?)
    }

    async fn upsert_call(&self, model: calls::Model) -> Result<calls::Model, Error> {
        Ok(call::upsert(&self.db, model).await?)
    }

    async fn resync_call(
        &self,
        id: Id,
        transcript: Option<String>,
        team: Option<String>,
    ) -> Result<calls::Model, Error> {
        Ok(call::resync(&self.db, id, transcript, team).await?)
    }

    async fn set_call_status(
        &self,
        id: Id,
        status: CallStatus,
        error_message: Option<String>,
    ) -> Result<calls::Model, Error> {
        Ok(call::update_status(&self.db, id, status, error_message).await?)
    }

    async fn list_calls_by_status(
        &self,
        status: CallStatus,
        limit: Option<u64>,
    ) -> Result<Vec<calls::Model>, Error> {
        Ok(call::find_by_status(&self.db, status, limit).await?)
    }

    async fn list_calls_synced_before(
        &self,
        status: CallStatus,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Vec<calls::Model>, Error> {
        Ok(call::find_by_status_synced_before(&self.db, status, cutoff).await?)
    }

    async fn list_calls_missing_transcript(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<calls::Model>, Error> {
        Ok(call::find_missing_transcript(&self.db, limit).await?)
    }

    async fn list_all_calls(&self) -> Result<Vec<calls::Model>, Error> {
        Ok(call::find_all(&self.db).await?)
    }

    async fn latest_call_sync(&self) -> Result<Option<DateTime<FixedOffset>>, Error> {
        Ok(call::latest_synced_at(&self.db).await?)
    }
}

#[async_trait]
impl AnalysisStore for DbStore {
    async fn insert_analysis(&self, model: analyses::Model) -> Result<analyses::Model, Error> {
        Ok(analysis::create(&self.db, model).await?)
    }

    async fn analyses_for_calls(&self, call_ids: &[Id]) -> Result<Vec<analyses::Model>, Error> {
        Ok(analysis::find_by_call_ids(&self.db, call_ids).await?)
    }

    async fn all_analyses(&self) -> Result<Vec<analyses::Model>, Error> {
        Ok(analysis::find_all(&self.db).await?)
    }

    async fn delete_analyses(&self, ids: &[Id]) -> Result<u64, Error> {
        Ok(analysis::delete_by_ids(&self.db, ids).await?)
    }
}

#[async_trait]
impl UnmatchedCallStore for DbStore {
    async fn insert_unmatched_call(
        &self,
        model: unmatched_calls::Model,
    ) -> Result<unmatched_calls::Model, Error> {
        Ok(unmatched_call::create(&self.db, model).await?)
    }

    async fn list_unreviewed_unmatched_calls(
        &self,
    ) -> Result<Vec<unmatched_calls::Model>, Error> {
        Ok(unmatched_call::find_unreviewed(&self.db).await?)
    }
}

#[async_trait]
impl AuditLogStore for DbStore {
    async fn append_webhook_log(
        &self,
        model: webhook_logs::Model,
    ) -> Result<webhook_logs::Model, Error> {
        Ok(webhook_log::create(&self.db, model).await?)
    }
}
