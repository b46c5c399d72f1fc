//! SeaORM Entity for the analyses table.
//! Written once per classification or scoring pass and never updated.

use crate::call_type::CallType;
use crate::json_types::StringList;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::analyses::Model)]
#[sea_orm(schema_name = "sales_pipeline", table_name = "analyses")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    #[schema(value_type = String, format = Uuid)]
    pub call_id: Id,

    /// 0-100; absent when the classification gate rejected the call
    pub framework_score: Option<i32>,

    /// 0-100; absent when the classification gate rejected the call
    pub sentiment_score: Option<i32>,

    pub is_sales_call: bool,

    pub call_type: CallType,

    /// Classifier confidence in [0.0, 1.0]
    #[sea_orm(column_type = "Double")]
    pub confidence_score: f64,

    /// Populated only when `is_sales_call` is false
    pub rejection_reason: Option<String>,

    #[schema(value_type = Vec<String>)]
    #[sea_orm(column_type = "JsonBinary")]
    pub key_topics: StringList,

    #[schema(value_type = Object)]
    #[sea_orm(column_type = "JsonBinary")]
    pub analysis_data: Json,

    #[schema(value_type = String, format = DateTime)]
    pub analyzed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::calls::Entity",
        from = "Column::CallId",
        to = "super::calls::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Calls,
}

impl Related<super::calls::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Calls.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
