//! Insert operations for the unmatched_calls triage table.

use super::error::Error;
use entity::unmatched_calls::{ActiveModel, Entity, Model};
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, TryIntoModel};

pub async fn create(db: &DatabaseConnection, model: Model) -> Result<Model, Error> {
    debug!("Storing unmatched call for review: {}", model.external_call_id);

    let active_model = ActiveModel {
        external_call_id: Set(model.external_call_id),
        meeting_title: Set(model.meeting_title),
        start_time: Set(model.start_time),
        duration_seconds: Set(model.duration_seconds),
        transcript: Set(model.transcript),
        recording_url: Set(model.recording_url),
        participants: Set(model.participants),
        payload: Set(model.payload),
        reviewed: Set(false),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    Ok(active_model.save(db).await?.try_into_model()?)
}

/// Unmatched calls nobody has triaged yet, newest first.
pub async fn find_unreviewed(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(entity::unmatched_calls::Column::Reviewed.eq(false))
        .order_by_desc(entity::unmatched_calls::Column::CreatedAt)
        .all(db)
        .await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use entity::json_types::{Participant, Participants};
    use entity::Id;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn create_stores_an_unreviewed_row() -> Result<(), Error> {
        let now = chrono::Utc::now();
        let unmatched = Model {
            id: Id::new_v4(),
            external_call_id: "abc-2".to_owned(),
            meeting_title: "Intro".to_owned(),
            start_time: now.into(),
            duration_seconds: 600,
            transcript: None,
            recording_url: None,
            participants: Participants(vec![Participant::new("Lead", "lead@y.com")]),
            payload: serde_json::json!({ "call_id": "abc-2" }),
            reviewed: false,
            created_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![unmatched.clone()]])
            .into_connection();

        let stored = create(&db, unmatched.clone()).await?;

        assert_eq!(stored.external_call_id, "abc-2");
        assert!(!stored.reviewed);
        Ok(())
    }
}
