//! SeaORM Entity for the calls table.
//! One row per provider recording, keyed for idempotency on `external_call_id`.

use crate::call_status::CallStatus;
use crate::json_types::Participants;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::calls::Model)]
#[sea_orm(schema_name = "sales_pipeline", table_name = "calls")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    /// Recording id assigned by the provider
    #[sea_orm(unique)]
    pub external_call_id: String,

    /// Owning rep; null only until a match is made
    #[schema(value_type = Option<String>, format = Uuid)]
    pub rep_id: Option<Id>,

    pub meeting_title: String,

    /// Empty or null while the provider is still transcribing
    #[sea_orm(column_type = "Text", nullable)]
    pub transcript: Option<String>,

    pub recording_url: Option<String>,

    #[schema(value_type = Vec<crate::json_types::Participant>)]
    #[sea_orm(column_type = "JsonBinary")]
    pub participants: Participants,

    #[schema(value_type = String, format = DateTime)]
    pub start_time: DateTimeWithTimeZone,

    pub duration_seconds: i32,

    pub status: CallStatus,

    /// Provider team label used for filtered multi-team import
    pub team: Option<String>,

    /// Last scoring failure, cleared on the next successful pass
    pub error_message: Option<String>,

    /// Last write from the sync or webhook path, also bumped on status writes
    #[schema(value_type = String, format = DateTime)]
    pub synced_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Transcript length in characters, zero when absent.
    pub fn transcript_len(&self) -> usize {
        self.transcript
            .as_deref()
            .map(|t| t.chars().count())
            .unwrap_or(0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sales_reps::Entity",
        from = "Column::RepId",
        to = "super::sales_reps::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    SalesReps,

    #[sea_orm(has_many = "super::analyses::Entity")]
    Analyses,
}

impl Related<super::sales_reps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesReps.def()
    }
}

impl Related<super::analyses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analyses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
