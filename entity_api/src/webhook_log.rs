//! Append-only writes to the webhook_logs audit table.

use super::error::Error;
use entity::webhook_logs::{ActiveModel, Model};
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, TryIntoModel};

pub async fn create(db: &DatabaseConnection, model: Model) -> Result<Model, Error> {
    trace!(
        "Recording {} {} -> {}",
        model.method,
        model.endpoint,
        model.status_code
    );

    let active_model = ActiveModel {
        endpoint: Set(model.endpoint),
        method: Set(model.method),
        payload: Set(model.payload),
        status_code: Set(model.status_code),
        error_message: Set(model.error_message),
        processing_time_ms: Set(model.processing_time_ms),
        events: Set(model.events),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}
