//! Read and lifecycle operations for the sales_reps table.

use super::error::Error;
use entity::json_types::StringList;
use entity::sales_reps::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{Set, Unchanged},
    DatabaseConnection, QueryOrder, TryIntoModel,
};

/// Creates a new, active sales rep. The email is stored lower-cased.
pub async fn create(
    db: &DatabaseConnection,
    name: &str,
    email: &str,
    teams: Vec<String>,
) -> Result<Model, Error> {
    debug!("Creating new sales rep: {email}");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        name: Set(name.to_owned()),
        email: Set(email.trim().to_lowercase()),
        teams: Set(StringList(teams)),
        archived_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Finds every active rep whose email is in `emails`, oldest rep first.
/// `emails` must already be lower-cased.
pub async fn find_active_by_emails(
    db: &DatabaseConnection,
    emails: &[String],
) -> Result<Vec<Model>, Error> {
    if emails.is_empty() {
        return Ok(Vec::new());
    }

    Ok(Entity::find()
        .filter(Column::Email.is_in(emails.iter().cloned()))
        .filter(Column::ArchivedAt.is_null())
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Finds the active rep with `email`, if any.
pub async fn find_active_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Email.eq(email.trim().to_lowercase()))
        .filter(Column::ArchivedAt.is_null())
        .one(db)
        .await?)
}

/// Soft-deletes a rep by stamping `archived_at`.
pub async fn archive(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;
    debug!("Archiving sales rep: {id}");

    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        id: Unchanged(existing.id),
        name: Unchanged(existing.name),
        email: Unchanged(existing.email),
        teams: Unchanged(existing.teams),
        archived_at: Set(Some(now.into())),
        created_at: Unchanged(existing.created_at),
        updated_at: Set(now.into()),
    };

    Ok(active_model.update(db).await?.try_into_model()?)
}
