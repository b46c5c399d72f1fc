//! Sales call classification provider trait.

use crate::types::classification::{CallClassification, ClassificationRequest};
use crate::Error;
use async_trait::async_trait;

/// Decides whether a transcript is an authentic sales call before any
/// expensive scoring runs.
///
/// Implementations receive the transcript already truncated by the caller and
/// should return an error, rather than a guess, when the engine fails or
/// answers with unparseable output. The caller owns the fail-open policy.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn classify(&self, request: ClassificationRequest) -> Result<CallClassification, Error>;

    /// Return unique identifier for this provider (e.g., "openai").
    fn provider_id(&self) -> &str;
}
