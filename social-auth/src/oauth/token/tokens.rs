//! OAuth token types.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const TOKEN_MASK_PREFIX_LEN: usize = 4;
const TOKEN_MASK_SUFFIX_LEN: usize = 4;

/// Access/refresh token pair returned by the token endpoint.
///
/// Replaced wholesale on every successful refresh, never patched field by field.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Refresh token, present only when the server issued (or rotated) one.
    pub refresh_token: Option<SecretString>,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<u64>,
    /// Token type (usually "bearer").
    pub token_type: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// When the token endpoint answered.
    pub obtained_at: DateTime<Utc>,
}

impl TokenPair {
    /// When the access token expires, if the server said.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| self.obtained_at + Duration::seconds(secs))
    }

    /// The new refresh token, if it differs from `previous`.
    pub fn rotated_refresh_token(&self, previous: &SecretString) -> Option<&SecretString> {
        self.refresh_token
            .as_ref()
            .filter(|new| new.expose_secret() != previous.expose_secret())
    }
}

/// Successful token endpoint response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token_pair(self) -> TokenPair {
        TokenPair {
            access_token: SecretString::from(self.access_token),
            refresh_token: self
                .refresh_token
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from),
            expires_in: self.expires_in,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            scopes: self
                .scope
                .map(|scope| scope.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            obtained_at: Utc::now(),
        }
    }
}

/// Error body returned by the token endpoint on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TokenErrorResponse {
    pub(crate) fn description(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.detail.clone())
            .or_else(|| self.title.clone())
    }
}

/// Mask a token for log output, keeping a short prefix and suffix.
pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    let len = trimmed.len();
    if len <= TOKEN_MASK_PREFIX_LEN + TOKEN_MASK_SUFFIX_LEN || !trimmed.is_ascii() {
        return "*".repeat(len.min(8));
    }

    let prefix = &trimmed[..TOKEN_MASK_PREFIX_LEN];
    let suffix = &trimmed[len - TOKEN_MASK_SUFFIX_LEN..];
    format!("{prefix}...{suffix}")
}
