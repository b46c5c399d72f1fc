//! Standard Bearer token authentication.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

use super::{ApiKeyProvider, AuthMethod, ProviderAuth};

/// Standard Bearer token authentication.
///
/// Uses the standard `Authorization: Bearer <token>` header pattern.
pub struct BearerTokenAuth {
    provider: ApiKeyProvider,
    token: SecretString,
}

impl BearerTokenAuth {
    /// Create a new Bearer token authenticator.
    pub fn new(provider: ApiKeyProvider, token: SecretString) -> Self {
        Self { provider, token }
    }

    /// Get a reference to the token.
    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

impl ProviderAuth for BearerTokenAuth {
    fn provider(&self) -> ApiKeyProvider {
        self.provider
    }

    fn auth_method(&self) -> AuthMethod {
        AuthMethod::BearerToken
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token.expose_secret())
    }
}
