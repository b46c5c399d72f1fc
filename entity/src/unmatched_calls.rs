//! SeaORM Entity for the unmatched_calls table.
//! Calls with no active rep among their participants, held for manual triage.

use crate::json_types::Participants;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::unmatched_calls::Model)]
#[sea_orm(schema_name = "sales_pipeline", table_name = "unmatched_calls")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub external_call_id: String,

    pub meeting_title: String,

    #[schema(value_type = String, format = DateTime)]
    pub start_time: DateTimeWithTimeZone,

    pub duration_seconds: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub transcript: Option<String>,

    pub recording_url: Option<String>,

    #[schema(value_type = Vec<crate::json_types::Participant>)]
    #[sea_orm(column_type = "JsonBinary")]
    pub participants: Participants,

    /// Full inbound event as received
    #[schema(value_type = Object)]
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    pub reviewed: bool,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
