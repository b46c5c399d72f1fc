//! API key authentication for service providers.
//!
//! Provides traits and implementations for authenticating requests to services
//! that use static API keys (Fathom) or bearer tokens (OpenAI).

mod auth;
mod bearer;

pub use auth::{ApiKeyAuth, ApiKeyProvider, AuthMethod, ProviderAuth};
pub use bearer::BearerTokenAuth;
