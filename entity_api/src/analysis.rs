//! Persistence operations for the analyses table.

use super::error::Error;
use entity::analyses::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, TryIntoModel,
};

/// Stores a new analysis. `id` and `analyzed_at` on the input are ignored.
pub async fn create(db: &DatabaseConnection, model: Model) -> Result<Model, Error> {
    debug!(
        "Creating analysis for call {} (is_sales_call={})",
        model.call_id, model.is_sales_call
    );

    let active_model = ActiveModel {
        call_id: Set(model.call_id),
        framework_score: Set(model.framework_score),
        sentiment_score: Set(model.sentiment_score),
        is_sales_call: Set(model.is_sales_call),
        call_type: Set(model.call_type),
        confidence_score: Set(model.confidence_score),
        rejection_reason: Set(model.rejection_reason),
        key_topics: Set(model.key_topics),
        analysis_data: Set(model.analysis_data),
        analyzed_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}

/// All analyses for `call_id`, most recent first.
pub async fn find_by_call_id(db: &DatabaseConnection, call_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::CallId.eq(call_id))
        .order_by_desc(Column::AnalyzedAt)
        .all(db)
        .await?)
}

/// All analyses for any of `call_ids`, ordered by call then most recent first.
pub async fn find_by_call_ids(
    db: &DatabaseConnection,
    call_ids: &[Id],
) -> Result<Vec<Model>, Error> {
    if call_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(Entity::find()
        .filter(Column::CallId.is_in(call_ids.iter().copied()))
        .order_by_asc(Column::CallId)
        .order_by_desc(Column::AnalyzedAt)
        .all(db)
        .await?)
}

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .order_by_asc(Column::CallId)
        .order_by_desc(Column::AnalyzedAt)
        .all(db)
        .await?)
}

/// Deletes the given analyses and returns how many rows were removed.
pub async fn delete_by_ids(db: &DatabaseConnection, ids: &[Id]) -> Result<u64, Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    debug!("Deleting {} analyses", ids.len());
    let result = Entity::delete_many()
        .filter(Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
