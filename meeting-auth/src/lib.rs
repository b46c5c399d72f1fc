//! # meeting-auth
//!
//! Outbound and inbound authentication plumbing for the meeting-recording provider
//! and the reasoning engine:
//! - API key authentication (`X-Api-Key` for Fathom, bearer tokens for OpenAI)
//! - The retrying HTTP transport every outbound provider call goes through
//! - Webhook signature validation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meeting_auth::{
//!     api_key::{ApiKeyAuth, ApiKeyProvider},
//!     http::{AuthenticatedClientBuilder, BackoffPolicy},
//!     webhook::{HmacWebhookValidator, WebhookValidator},
//! };
//! ```

pub mod api_key;
pub mod error;
pub mod http;
pub mod webhook;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
