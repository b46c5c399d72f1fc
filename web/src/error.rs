use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    // List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
    pub fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => StatusCode::NOT_FOUND,
                    EntityErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
                InternalErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
                InternalErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::Network | ExternalErrorKind::TransientUpstream => {
                    StatusCode::BAD_GATEWAY
                }
                ExternalErrorKind::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn message(&self) -> String {
        self.0.message()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {status}: {}", self.0);
        } else {
            debug!("Request rejected with {status}: {}", self.0);
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": status.canonical_reason().unwrap_or("Error"),
                "message": self.message(),
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_kinds_to_status_codes() {
        assert_eq!(
            Error::from(DomainError::config("missing key")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::from(DomainError::validation("hours")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::from(DomainError::unauthenticated("bad token")).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::from(DomainError {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::TransientUpstream),
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::from(DomainError {
                source: None,
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                    EntityErrorKind::NotFound
                )),
            })
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
