//! Clients for the services the pipeline talks to: the meeting-recording provider
//! and the reasoning engine. Every outbound request goes through
//! `meeting_auth::http::AuthenticatedClient`, which owns retries and backoff.

use crate::call_event::CallEvent;
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meeting_auth::http::BackoffPolicy;
use service::config::Config;
use std::time::Duration;

pub mod fathom;
pub mod openai;

/// The bulk-sync side of the meeting-recording provider.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Calls created after `since`, newest first, at most `max_calls` of them.
    async fn meetings_since(
        &self,
        since: DateTime<Utc>,
        max_calls: usize,
    ) -> Result<Vec<CallEvent>, Error>;

    async fn list_teams(&self) -> Result<Vec<String>, Error>;
}

/// The retry policy every outbound client is built with.
pub fn backoff_policy(config: &Config) -> BackoffPolicy {
    BackoffPolicy::new(
        config.retry_max_retries,
        Duration::from_millis(config.retry_initial_delay_ms),
        Duration::from_millis(config.retry_max_delay_ms),
        config.retry_backoff_multiplier,
    )
}
