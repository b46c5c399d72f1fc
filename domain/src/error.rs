//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use meeting_auth::error::{
    ApiKeyErrorKind, Error as MeetingAuthError, ErrorKind as MeetingAuthErrorKind, HttpErrorKind,
};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. The intent is to translate errors between layers while maintaining
/// layer boundaries. Ex. `domain` is dependent on `entity_api`, and `web` is dependent on `domain`.
/// but `web` should not be dependent, directly, on `entity_api`. Each layer is free to define its own
/// error kinds to whatever richeness needed at that layer. Ultimately the various `error_kind`s are used
/// by `web` to return appropriate HTTP status codes and messages to the client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}
/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Config,
    /// An inbound payload failed structural validation. Carries the field names at fault.
    Validation(String),
    /// An inbound request carried a missing or wrong signature or bearer token.
    Unauthenticated,
    Other(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    DbTransaction,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    /// The provider kept answering 429 or 5xx until the retry budget ran out.
    TransientUpstream,
    Other(String),
}

impl Error {
    pub fn config(message: &str) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn validation(fields: &str) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(fields.to_string())),
        }
    }

    pub fn unauthenticated(message: &str) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Unauthenticated),
        }
    }

    pub fn upstream(message: String) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                "Unexpected provider response".to_string(),
            )),
        }
    }

    /// The innermost message, suitable for an `error_message` column or a response body.
    pub fn message(&self) -> String {
        match &self.source {
            Some(source) => source.to_string(),
            None => match &self.error_kind {
                DomainErrorKind::Internal(InternalErrorKind::Validation(fields)) => {
                    format!("Invalid fields: {fields}")
                }
                kind => format!("{kind:?}"),
            },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api`` layer to the `domain`` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::InvalidQueryTerm
            | EntityApiErrorKind::ValidationError
            | EntityApiErrorKind::ConstraintViolation => EntityErrorKind::Invalid,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            _ => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        // A response body that could not be decoded is the provider's fault, not the network's.
        } else if err.is_decode() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                    "Unexpected provider response".to_string(),
                )),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

impl From<MeetingAuthError> for Error {
    fn from(err: MeetingAuthError) -> Self {
        let error_kind = match &err.error_kind {
            MeetingAuthErrorKind::Http(HttpErrorKind::ExhaustedRetries { .. }) => {
                DomainErrorKind::External(ExternalErrorKind::TransientUpstream)
            }
            MeetingAuthErrorKind::Http(HttpErrorKind::BuilderFailed) => {
                DomainErrorKind::Internal(InternalErrorKind::Other(err.to_string()))
            }
            MeetingAuthErrorKind::Http(_) => DomainErrorKind::External(ExternalErrorKind::Network),
            MeetingAuthErrorKind::ApiKey(ApiKeyErrorKind::NotConfigured) => {
                DomainErrorKind::Internal(InternalErrorKind::Config)
            }
            MeetingAuthErrorKind::ApiKey(ApiKeyErrorKind::Rejected) => DomainErrorKind::External(
                ExternalErrorKind::Other("Provider rejected the API key".to_string()),
            ),
            MeetingAuthErrorKind::Webhook(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Unauthenticated)
            }
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<meeting_ai::Error> for Error {
    fn from(err: meeting_ai::Error) -> Self {
        let error_kind = match &err {
            meeting_ai::Error::RateLimited { .. } => {
                DomainErrorKind::External(ExternalErrorKind::TransientUpstream)
            }
            meeting_ai::Error::Network(_) | meeting_ai::Error::Timeout(_) => {
                DomainErrorKind::External(ExternalErrorKind::Network)
            }
            meeting_ai::Error::Configuration(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Config)
            }
            other => DomainErrorKind::External(ExternalErrorKind::Other(other.to_string())),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
