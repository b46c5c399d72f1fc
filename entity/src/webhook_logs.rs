//! SeaORM Entity for the webhook_logs table.
//! Append-only audit record of every inbound webhook and sync request.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::webhook_logs::Model)]
#[sea_orm(schema_name = "sales_pipeline", table_name = "webhook_logs")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub endpoint: String,

    pub method: String,

    #[schema(value_type = Object)]
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    pub status_code: i32,

    pub error_message: Option<String>,

    pub processing_time_ms: i64,

    /// Domain events produced while handling the request, with offsets in ms
    #[schema(value_type = Vec<Object>)]
    #[sea_orm(column_type = "JsonBinary")]
    pub events: Json,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
