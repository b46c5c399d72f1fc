use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of meeting a transcript was classified as.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "call_type")]
pub enum CallType {
    #[sea_orm(string_value = "sales_call")]
    SalesCall,
    #[sea_orm(string_value = "team_meeting")]
    TeamMeeting,
    #[sea_orm(string_value = "demo")]
    Demo,
    #[sea_orm(string_value = "support")]
    Support,
    #[sea_orm(string_value = "development")]
    Development,
    #[sea_orm(string_value = "stand_up")]
    StandUp,
    #[sea_orm(string_value = "unknown")]
    #[default]
    Unknown,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallType::SalesCall => write!(fmt, "sales_call"),
            CallType::TeamMeeting => write!(fmt, "team_meeting"),
            CallType::Demo => write!(fmt, "demo"),
            CallType::Support => write!(fmt, "support"),
            CallType::Development => write!(fmt, "development"),
            CallType::StandUp => write!(fmt, "stand_up"),
            CallType::Unknown => write!(fmt, "unknown"),
        }
    }
}
