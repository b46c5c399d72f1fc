//! API key authentication trait and implementation.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Known API key providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyProvider {
    Fathom,
    OpenAi,
}

impl ApiKeyProvider {
    /// Get the provider identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyProvider::Fathom => "fathom",
            ApiKeyProvider::OpenAi => "openai",
        }
    }
}

/// Authentication method for HTTP requests.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthMethod {
    /// Custom header with optional prefix (e.g., "X-Api-Key: xxx")
    ApiKeyHeader {
        header_name: String,
        prefix: Option<String>,
    },
    /// Standard Bearer token
    BearerToken,
}

/// Trait for authenticating HTTP requests with API keys or bearer tokens.
///
/// Implementations handle provider-specific authentication patterns like:
/// - Fathom: `X-Api-Key: xxx`
/// - OpenAI: `Authorization: Bearer xxx`
pub trait ProviderAuth: Send + Sync {
    /// Get the provider identifier.
    fn provider(&self) -> ApiKeyProvider;

    /// Get the authentication method used by this provider.
    fn auth_method(&self) -> AuthMethod;

    /// Apply authentication to a request builder.
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder;
}

/// API key authentication sent in a provider-specific header.
///
/// # Examples
///
/// ```rust,ignore
/// // Fathom: X-Api-Key: xxx
/// let auth = ApiKeyAuth::new(ApiKeyProvider::Fathom, SecretString::new("api_key_here".to_string()));
/// ```
pub struct ApiKeyAuth {
    provider: ApiKeyProvider,
    api_key: SecretString,
    header_name: String,
    prefix: Option<String>,
}

impl ApiKeyAuth {
    /// Create a new API key authenticator using the provider's standard header.
    pub fn new(provider: ApiKeyProvider, api_key: SecretString) -> Self {
        let (header_name, prefix) = match provider {
            ApiKeyProvider::Fathom => ("X-Api-Key".to_string(), None),
            ApiKeyProvider::OpenAi => ("Authorization".to_string(), Some("Bearer".to_string())),
        };

        Self {
            provider,
            api_key,
            header_name,
            prefix,
        }
    }

    /// Get a reference to the API key.
    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }
}

impl ProviderAuth for ApiKeyAuth {
    fn provider(&self) -> ApiKeyProvider {
        self.provider
    }

    fn auth_method(&self) -> AuthMethod {
        AuthMethod::ApiKeyHeader {
            header_name: self.header_name.clone(),
            prefix: self.prefix.clone(),
        }
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        let auth_value = if let Some(prefix) = &self.prefix {
            format!("{} {}", prefix, self.api_key.expose_secret())
        } else {
            self.api_key.expose_secret().to_string()
        };

        request.header(&self.header_name, auth_value)
    }
}
