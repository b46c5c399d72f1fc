use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Analysis lifecycle of a call: `pending -> analyzing -> {completed | failed}`.
/// `analyzing` may also fall back to `pending` through reconciliation.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "call_status")]
pub enum CallStatus {
    /// Stored and waiting for a usable transcript or an analysis pass
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Classified as a sales call and handed to framework scoring
    #[sea_orm(string_value = "analyzing")]
    Analyzing,
    /// Handled: either scored or rejected by the classification gate
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Scoring or persisting the analysis failed
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Pending => write!(fmt, "pending"),
            CallStatus::Analyzing => write!(fmt, "analyzing"),
            CallStatus::Completed => write!(fmt, "completed"),
            CallStatus::Failed => write!(fmt, "failed"),
        }
    }
}
