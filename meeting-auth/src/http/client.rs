//! Authenticated HTTP client with bounded retries.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::{Request, RequestBuilder, Response, StatusCode};
use reqwest_retry::{RetryDecision, RetryPolicy};
use tracing::{debug, warn};

use super::BackoffPolicy;
use crate::api_key::ProviderAuth;
use crate::error::{http_error, Error, ErrorKind, HttpErrorKind};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Backoff applied to 429, 5xx and transport failures.
    pub backoff: BackoffPolicy,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            user_agent: format!("meeting-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Why an attempt is eligible for a retry.
enum Failure {
    Status(StatusCode),
    Transport(reqwest::Error),
}

/// HTTP client that authenticates every request and retries rate-limit,
/// server and transport failures with exponential backoff.
///
/// Responses with any other status, including 4xx other than 429, are
/// returned to the caller on the first attempt. The client holds no state
/// between requests.
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: reqwest::Client,
    auth: Option<Arc<dyn ProviderAuth>>,
    backoff: BackoffPolicy,
}

impl AuthenticatedClient {
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.authenticate(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.authenticate(self.client.post(url))
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// A client sharing this one's connection pool and credentials with a different retry budget.
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            client: self.client.clone(),
            auth: self.auth.clone(),
            backoff: self.backoff.clone().with_max_retries(max_retries),
        }
    }

    /// Sends the request, retrying per the backoff policy.
    ///
    /// Fails with `HttpErrorKind::ExhaustedRetries` once every attempt has failed.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let request = request.build()?;
        let started = SystemTime::now();
        let max_attempts = self.backoff.max_attempts();
        let mut n_past_retries = 0;

        loop {
            let attempt = n_past_retries + 1;
            let failure = match self.client.execute(replayable(&request)?).await {
                Ok(response) if !is_retryable(response.status()) => {
                    debug!(
                        "{} {} -> {} (attempt {attempt}/{max_attempts})",
                        request.method(),
                        request.url().path(),
                        response.status()
                    );
                    return Ok(response);
                }
                Ok(response) => Failure::Status(response.status()),
                Err(err) => Failure::Transport(err),
            };

            match self.backoff.should_retry(started, n_past_retries) {
                RetryDecision::Retry { .. } => {
                    let delay = self.backoff.delay_for(n_past_retries);
                    let cause = match &failure {
                        Failure::Status(status) => format!("status {status}"),
                        Failure::Transport(err) => format!("transport error: {err}"),
                    };
                    warn!(
                        "{} {} failed with {cause}; retrying in {}ms (attempt {attempt}/{max_attempts})",
                        request.method(),
                        request.url().path(),
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    n_past_retries += 1;
                }
                RetryDecision::DoNotRetry => return Err(exhausted(attempt, failure)),
            }
        }
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(auth) => auth.authenticate(request),
            None => request,
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn replayable(request: &Request) -> Result<Request, Error> {
    request.try_clone().ok_or_else(|| {
        http_error(
            HttpErrorKind::RequestFailed,
            "Request body is a stream and cannot be retried",
        )
    })
}

fn exhausted(attempts: u32, failure: Failure) -> Error {
    let (last_status, source): (Option<u16>, Box<dyn std::error::Error + Send + Sync>) =
        match failure {
            Failure::Status(status) => (
                Some(status.as_u16()),
                format!("last attempt returned {status}").into(),
            ),
            Failure::Transport(err) => (None, Box::new(err)),
        };

    Error {
        source: Some(source),
        error_kind: ErrorKind::Http(HttpErrorKind::ExhaustedRetries {
            attempts,
            last_status,
        }),
    }
}

/// Builder for creating authenticated HTTP clients.
///
/// Provides a fluent API for constructing HTTP clients with:
/// - Authentication (API keys, bearer tokens)
/// - Exponential backoff on 429, 5xx and transport failures
/// - Timeout configuration
pub struct AuthenticatedClientBuilder {
    config: HttpClientConfig,
    auth: Option<Arc<dyn ProviderAuth>>,
}

impl AuthenticatedClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            auth: None,
        }
    }

    /// Set the authentication provider.
    pub fn with_auth(mut self, auth: Arc<dyn ProviderAuth>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<AuthenticatedClient, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .build()?;

        Ok(AuthenticatedClient {
            client,
            auth: self.auth,
            backoff: self.config.backoff,
        })
    }
}

impl Default for AuthenticatedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
