use uuid::Uuid;

pub mod prelude;

// Core entities
pub mod analyses;
pub mod calls;
pub mod sales_reps;

// Triage and audit entities
pub mod unmatched_calls;
pub mod webhook_logs;

// Enumerations and JSON column types
pub mod call_status;
pub mod call_type;
pub mod json_types;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
