//! Business logic for the sales call pipeline.
//!
//! Consumers of the `domain` crate should not need to depend on `entity_api` directly, so the
//! entity models and their enums are re-exported here. Everything that touches persistence goes
//! through the capability traits in [`store`], and everything that talks to the outside world goes
//! through [`gateway`].

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{
    analyses, call_status, call_type, calls, json_types, sales_reps, unmatched_calls,
    webhook_logs, Id,
};

pub mod audit;
pub mod call_classifier;
pub mod call_event;
pub mod diagnostics;
pub mod error;
pub mod gateway;
pub mod ingestion;
pub mod pipeline;
pub mod reconciler;
pub mod rep_matcher;
pub mod store;
pub mod sync;
pub mod webhook;
