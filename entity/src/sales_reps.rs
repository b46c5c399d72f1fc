//! SeaORM Entity for the sales_reps table.
//! Reps are soft-deleted through `archived_at`; only active reps own calls.

use crate::json_types::StringList;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::sales_reps::Model)]
#[sea_orm(schema_name = "sales_pipeline", table_name = "sales_reps")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub name: String,

    /// Stored lower-cased; unique across reps
    #[sea_orm(unique)]
    pub email: String,

    /// Provider team labels this rep owns calls for. Empty means every team.
    #[schema(value_type = Vec<String>)]
    #[sea_orm(column_type = "JsonBinary")]
    pub teams: StringList,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub archived_at: Option<DateTimeWithTimeZone>,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_active(&self) -> bool {
        self.archived_at.is_none()
    }

    /// Whether a call carrying `team` belongs to this rep under their team allow-list.
    pub fn owns_team(&self, team: Option<&str>) -> bool {
        if self.teams.is_empty() {
            return true;
        }
        match team {
            Some(team) => self.teams.contains(team),
            None => false,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::calls::Entity")]
    Calls,
}

impl Related<super::calls::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Calls.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
