//! Error types for reasoning-engine operations.

use std::fmt;

use meeting_auth::error::{ErrorKind as AuthErrorKind, HttpErrorKind};

/// Universal error type that abstracts provider-specific errors into common variants.
///
/// All provider implementations map their native errors to these variants,
/// preserving context while maintaining a provider-agnostic interface.
#[derive(Debug)]
pub enum Error {
    /// API key rejected or missing permissions.
    Authentication(String),

    /// Network connectivity issues, DNS failures, or connection timeouts.
    Network(String),

    /// Invalid parameters, missing credentials, or malformed configuration.
    Configuration(String),

    /// Provider-specific failures such as a refused completion.
    Provider(String),

    /// Operation exceeded the configured or provider-enforced timeout period.
    Timeout(String),

    /// Requested resource does not exist.
    NotFound(String),

    /// Provider rate limit exceeded after the transport's retry budget was spent.
    RateLimited { retry_after_seconds: u64 },

    /// Failed to serialize a request body.
    Serialization(String),

    /// The model answered with something that is not the expected JSON shape.
    Deserialization(String),

    /// Catch-all for errors that don't fit other categories.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::RateLimited {
                retry_after_seconds,
            } => {
                write!(f, "Rate limited: retry after {}s", retry_after_seconds)
            }
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
            Error::Other(err) => write!(f, "Other error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<meeting_auth::Error> for Error {
    fn from(err: meeting_auth::Error) -> Self {
        match &err.error_kind {
            AuthErrorKind::Http(HttpErrorKind::ExhaustedRetries {
                last_status: Some(429),
                ..
            }) => Error::RateLimited {
                retry_after_seconds: 0,
            },
            AuthErrorKind::Http(_) => Error::Network(err.to_string()),
            AuthErrorKind::ApiKey(_) => Error::Authentication(err.to_string()),
            AuthErrorKind::Webhook(_) => Error::Other(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialization(err.to_string())
    }
}
