//! Outbound HTTP: authenticated clients wrapped in the retry transport.

mod client;
mod retry;

pub use client::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};
pub use retry::BackoffPolicy;
