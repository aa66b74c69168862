//! HTTP client builder with bounded timeouts and optional bearer authentication.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, ErrorKind, HttpErrorKind};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request timeout. A timed out call is reported like any other
    /// network failure of the endpoint it was calling.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: format!("social-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Build an unauthenticated client (token endpoint calls add their own credentials).
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        AuthenticatedClientBuilder::from_config(self.clone()).build()
    }
}

/// HTTP client carrying a default `Authorization: Bearer` header.
pub type AuthenticatedClient = reqwest::Client;

/// Builder for creating authenticated HTTP clients.
///
/// No retry middleware is installed: token endpoint calls must never be replayed
/// with an already rejected refresh token, and downstream posts are not idempotent.
pub struct AuthenticatedClientBuilder {
    config: HttpClientConfig,
    bearer_token: Option<SecretString>,
}

impl AuthenticatedClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self::from_config(HttpClientConfig::default())
    }

    pub fn from_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            bearer_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<AuthenticatedClient, Error> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::Http(HttpErrorKind::BuilderFailed),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(client)
    }
}

impl Default for AuthenticatedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
