//! Secret store holding the refresh token between runs.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use tracing::{debug, warn};

use super::sealing::{SealedSecret, StorePublicKey};
use crate::error::{secret_publish_error, Error, ErrorKind, SecretPublishErrorKind};
use crate::http::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Result of a successful upsert, as reported by HTTP status only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    /// 201: the secret did not exist before.
    Created,
    /// 204: an existing secret was overwritten.
    Updated,
}

/// Trait for the remote store that persists the refresh token.
///
/// The store never returns secret values, so an upsert cannot be read back.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the public key secrets must currently be sealed against.
    async fn fetch_public_key(&self) -> Result<StorePublicKey, Error>;

    /// Create or replace the secret `name` with a sealed value.
    async fn upsert_secret(&self, name: &str, sealed: SealedSecret) -> Result<UpsertStatus, Error>;
}

/// Repository Actions secrets, addressed by `owner/repo`.
pub struct RepositorySecretStore {
    client: AuthenticatedClient,
    api_url: String,
    owner: String,
    repo: String,
}

impl RepositorySecretStore {
    /// Create a store client for `owner/repo`, authenticating with `token`.
    pub fn new(
        api_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: SecretString,
        http: &HttpClientConfig,
    ) -> Result<Self, Error> {
        let client = AuthenticatedClientBuilder::from_config(http.clone())
            .with_bearer_token(token)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    fn secrets_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/actions/secrets",
            self.api_url, self.owner, self.repo
        )
    }
}

#[async_trait]
impl SecretStore for RepositorySecretStore {
    async fn fetch_public_key(&self) -> Result<StorePublicKey, Error> {
        let url = format!("{}/public-key", self.secrets_url());
        debug!("Fetching secret store public key for {}/{}", self.owner, self.repo);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to fetch secret store public key: {:?}", e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::SecretPublish(SecretPublishErrorKind::Network),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Secret store public key request failed: {} {}", status, body);
            return Err(secret_publish_error(
                SecretPublishErrorKind::KeyFetchFailed,
                &format!("public key request returned {}", status.as_u16()),
            ));
        }

        response.json::<StorePublicKey>().await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::SecretPublish(SecretPublishErrorKind::KeyFetchFailed),
        })
    }

    async fn upsert_secret(&self, name: &str, sealed: SealedSecret) -> Result<UpsertStatus, Error> {
        let url = format!("{}/{}", self.secrets_url(), name);
        debug!("Writing secret {} sealed with key {}", name, sealed.key_id());

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&sealed)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to write secret {}: {:?}", name, e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::SecretPublish(SecretPublishErrorKind::Network),
                }
            })?;

        match response.status() {
            StatusCode::CREATED => Ok(UpsertStatus::Created),
            StatusCode::NO_CONTENT => Ok(UpsertStatus::Updated),
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!("Secret store rejected write of {}: {} {}", name, status, body);
                Err(secret_publish_error(
                    SecretPublishErrorKind::UnexpectedStatus(status.as_u16()),
                    &format!("secret write returned {}: {}", status.as_u16(), body),
                ))
            }
        }
    }
}
