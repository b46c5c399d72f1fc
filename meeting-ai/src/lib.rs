//! Reasoning-engine abstraction layer for sales call analysis.
//!
//! This crate provides trait-based abstractions for the two model-backed steps
//! of the pipeline:
//! - Classification: is this transcript an authentic sales call?
//! - Scoring: how well did the rep follow the sales framework?
//!
//! The design is provider-agnostic; the domain layer depends only on the traits
//! and the request/response types defined here, never on a concrete model API.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::Error;
pub use types::analysis::{ScoringRequest, ScoringResult};
pub use types::classification::{CallCategory, CallClassification, ClassificationRequest};
