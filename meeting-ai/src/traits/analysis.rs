//! Sales framework scoring provider trait.

use crate::types::analysis::{ScoringRequest, ScoringResult};
use crate::Error;
use async_trait::async_trait;

/// Abstraction for LLM-powered scoring of a sales call against the configured
/// sales framework.
///
/// Processing typically takes 10-60 seconds depending on transcript length and model.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn score(&self, request: ScoringRequest) -> Result<ScoringResult, Error>;

    /// Return unique identifier for this provider (e.g., "openai").
    ///
    /// Stored alongside the analysis for cost tracking and model comparison.
    fn provider_id(&self) -> &str;
}
