//! Persistence operations for the calls table.

use super::error::Error;
use entity::call_status::CallStatus;
use entity::calls::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, sea_query::OnConflict, ActiveValue::Set, Condition, DatabaseConnection,
    QueryOrder, QuerySelect, TryIntoModel,
};

/// Inserts a call, or refreshes the mutable fields of the row already holding
/// `external_call_id`. The database resolves concurrent inserts of the same id.
pub async fn upsert(db: &DatabaseConnection, model: Model) -> Result<Model, Error> {
    debug!("Upserting call: {}", model.external_call_id);

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        external_call_id: Set(model.external_call_id),
        rep_id: Set(model.rep_id),
        meeting_title: Set(model.meeting_title),
        transcript: Set(model.transcript),
        recording_url: Set(model.recording_url),
        participants: Set(model.participants),
        start_time: Set(model.start_time),
        duration_seconds: Set(model.duration_seconds),
        status: Set(model.status),
        team: Set(model.team),
        error_message: Set(None),
        synced_at: Set(now.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    let on_conflict = OnConflict::column(Column::ExternalCallId)
        .update_columns([
            Column::Transcript,
            Column::Team,
            Column::SyncedAt,
            Column::UpdatedAt,
        ])
        .to_owned();

    Ok(Entity::insert(active_model)
        .on_conflict(on_conflict)
        .exec_with_returning(db)
        .await?)
}

/// Refreshes the fields a provider resync may change on an existing call.
pub async fn resync(
    db: &DatabaseConnection,
    id: Id,
    transcript: Option<String>,
    team: Option<String>,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;
    debug!("Resyncing call: {}", existing.external_call_id);

    let now = chrono::Utc::now();
    let mut active_model: ActiveModel = existing.into();
    active_model.transcript = Set(transcript);
    active_model.team = Set(team);
    active_model.synced_at = Set(now.into());
    active_model.updated_at = Set(now.into());

    Ok(active_model.update(db).await?.try_into_model()?)
}

/// Writes a new status and bumps `synced_at`, so a call entering `analyzing`
/// starts its reconciliation window from this write.
pub async fn update_status(
    db: &DatabaseConnection,
    id: Id,
    status: CallStatus,
    error_message: Option<String>,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;
    debug!(
        "Updating call {} status {} -> {status}",
        existing.external_call_id, existing.status
    );

    let now = chrono::Utc::now();
    let mut active_model: ActiveModel = existing.into();
    active_model.status = Set(status);
    active_model.error_message = Set(error_message);
    active_model.synced_at = Set(now.into());
    active_model.updated_at = Set(now.into());

    Ok(active_model.update(db).await?.try_into_model()?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

pub async fn find_by_external_id(
    db: &DatabaseConnection,
    external_call_id: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::ExternalCallId.eq(external_call_id))
        .one(db)
        .await?)
}

/// Calls in `status`, least recently synced first.
pub async fn find_by_status(
    db: &DatabaseConnection,
    status: CallStatus,
    limit: Option<u64>,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Status.eq(status))
        .order_by_asc(Column::SyncedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Calls in `status` whose last write is older than `cutoff`.
pub async fn find_by_status_synced_before(
    db: &DatabaseConnection,
    status: CallStatus,
    cutoff: DateTimeWithTimeZone,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Status.eq(status))
        .filter(Column::SyncedAt.lt(cutoff))
        .order_by_asc(Column::SyncedAt)
        .all(db)
        .await?)
}

/// Calls with a null or empty transcript.
pub async fn find_missing_transcript(
    db: &DatabaseConnection,
    limit: Option<u64>,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(
            Condition::any()
                .add(Column::Transcript.is_null())
                .add(Column::Transcript.eq("")),
        )
        .order_by_desc(Column::SyncedAt)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find().order_by_asc(Column::CreatedAt).all(db).await?)
}

/// The most recent `synced_at` across all calls, used as the default sync cursor.
pub async fn latest_synced_at(
    db: &DatabaseConnection,
) -> Result<Option<DateTimeWithTimeZone>, Error> {
    Ok(Entity::find()
        .order_by_desc(Column::SyncedAt)
        .one(db)
        .await?
        .map(|call| call.synced_at))
}
