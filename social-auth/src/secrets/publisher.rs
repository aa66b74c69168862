//! Publishing a rotated refresh token to the secret store.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use super::sealing::seal;
use super::store::{SecretStore, UpsertStatus};
use crate::error::{Error, ErrorKind, SecretPublishErrorKind};
use crate::oauth::token::TokenPair;

/// Why no write was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The token endpoint did not issue a new refresh token.
    NotRotated,
    /// Publishing is disabled by configuration.
    DryRun,
}

/// Typed result of a publish attempt.
///
/// A `Failed` outcome does not invalidate the access token the run already
/// holds; callers decide whether to alert and continue.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published { key_id: String, status: UpsertStatus },
    Skipped(SkipReason),
    Failed {
        kind: SecretPublishErrorKind,
        reason: String,
    },
}

impl PublishOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PublishOutcome::Failed { .. })
    }

    fn from_error(err: Error) -> Self {
        let kind = match &err.error_kind {
            ErrorKind::SecretPublish(kind) => kind.clone(),
            _ => SecretPublishErrorKind::SealFailed,
        };
        PublishOutcome::Failed {
            kind,
            reason: err.to_string(),
        }
    }
}

/// Receives every successful token pair before the refresh returns.
#[async_trait]
pub trait RotationPublisher: Send + Sync {
    /// Persist `tokens.refresh_token` if present; a no-op otherwise.
    async fn publish_if_rotated(&self, tokens: &TokenPair) -> PublishOutcome;
}

/// Seals and upserts rotated refresh tokens into a [`SecretStore`].
pub struct SecretRotationPublisher<S: SecretStore> {
    store: S,
    secret_name: String,
    dry_run: bool,
}

impl<S: SecretStore> SecretRotationPublisher<S> {
    pub fn new(store: S, secret_name: impl Into<String>) -> Self {
        Self {
            store,
            secret_name: secret_name.into(),
            dry_run: false,
        }
    }

    /// Skip all store calls, logging what would have been written.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    /// Fetch the current key, seal, and upsert. Each call fetches a fresh key.
    async fn publish(&self, refresh_token: &str) -> Result<PublishOutcome, Error> {
        let public_key = self.store.fetch_public_key().await?;
        let sealed = seal(&public_key, refresh_token.as_bytes())?;
        let key_id = sealed.key_id().to_string();
        let status = self.store.upsert_secret(&self.secret_name, sealed).await?;
        Ok(PublishOutcome::Published { key_id, status })
    }
}

#[async_trait]
impl<S: SecretStore> RotationPublisher for SecretRotationPublisher<S> {
    async fn publish_if_rotated(&self, tokens: &TokenPair) -> PublishOutcome {
        let Some(refresh_token) = tokens.refresh_token.as_ref() else {
            info!("Refresh token was not rotated; nothing to publish");
            return PublishOutcome::Skipped(SkipReason::NotRotated);
        };

        if self.dry_run {
            warn!(
                "Dry run: skipping write of rotated refresh token to secret {}",
                self.secret_name
            );
            return PublishOutcome::Skipped(SkipReason::DryRun);
        }

        match self.publish(refresh_token.expose_secret()).await {
            Ok(outcome) => {
                if let PublishOutcome::Published { key_id, status } = &outcome {
                    info!(
                        "Published rotated refresh token to secret {} ({:?}, key {})",
                        self.secret_name, status, key_id
                    );
                }
                outcome
            }
            Err(e) => {
                error!(
                    "Failed to publish rotated refresh token to secret {}: {}. \
                     The previous refresh token is no longer valid; update the secret \
                     manually or re-run the authorization exchange before the next run.",
                    self.secret_name, e
                );
                PublishOutcome::from_error(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::sealing::{SealedSecret, StorePublicKey};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::Utc;
    use crypto_box::SecretKey;
    use rand::rngs::OsRng;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SECRET_NAME: &str = "X_OAUTH2_REFRESH_TOKEN";

    struct MockStore {
        secret_key: SecretKey,
        upsert_status: Option<UpsertStatus>,
        key_fetches: AtomicUsize,
        written: Mutex<Vec<(String, SealedSecret)>>,
    }

    impl MockStore {
        fn new(upsert_status: Option<UpsertStatus>) -> Self {
            Self {
                secret_key: SecretKey::generate(&mut OsRng),
                upsert_status,
                key_fetches: AtomicUsize::new(0),
                written: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.key_fetches.load(Ordering::SeqCst) + self.written.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SecretStore for &MockStore {
        async fn fetch_public_key(&self) -> Result<StorePublicKey, Error> {
            self.key_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(StorePublicKey {
                key_id: "K1".to_string(),
                key: BASE64.encode(self.secret_key.public_key().as_bytes()),
            })
        }

        async fn upsert_secret(
            &self,
            name: &str,
            sealed: SealedSecret,
        ) -> Result<UpsertStatus, Error> {
            self.written.lock().unwrap().push((name.to_string(), sealed));
            self.upsert_status.ok_or_else(|| {
                crate::error::secret_publish_error(
                    SecretPublishErrorKind::UnexpectedStatus(403),
                    "forbidden",
                )
            })
        }
    }

    fn tokens(refresh: Option<&str>) -> TokenPair {
        TokenPair {
            access_token: SecretString::from("A2".to_string()),
            refresh_token: refresh.map(|r| SecretString::from(r.to_string())),
            expires_in: Some(7200),
            token_type: "bearer".to_string(),
            scopes: vec![],
            obtained_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_no_refresh_token_is_noop() {
        let store = MockStore::new(Some(UpsertStatus::Updated));
        let publisher = SecretRotationPublisher::new(&store, SECRET_NAME);

        let outcome = publisher.publish_if_rotated(&tokens(None)).await;

        assert_eq!(outcome, PublishOutcome::Skipped(SkipReason::NotRotated));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_store_calls() {
        let store = MockStore::new(Some(UpsertStatus::Updated));
        let publisher =
            SecretRotationPublisher::new(&store, SECRET_NAME).with_dry_run(true);

        let outcome = publisher.publish_if_rotated(&tokens(Some("R2"))).await;

        assert_eq!(outcome, PublishOutcome::Skipped(SkipReason::DryRun));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_rotated_token_is_sealed_and_written() {
        let store = MockStore::new(Some(UpsertStatus::Updated));
        let publisher = SecretRotationPublisher::new(&store, SECRET_NAME);

        let outcome = publisher.publish_if_rotated(&tokens(Some("R2"))).await;

        assert_eq!(
            outcome,
            PublishOutcome::Published {
                key_id: "K1".to_string(),
                status: UpsertStatus::Updated,
            }
        );
        let written = store.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        let (name, sealed) = &written[0];
        assert_eq!(name, SECRET_NAME);
        let ciphertext = BASE64.decode(sealed.encrypted_value()).unwrap();
        assert_eq!(store.secret_key.unseal(&ciphertext).unwrap(), b"R2");
    }

    #[tokio::test]
    async fn test_rejected_write_is_failed_outcome() {
        let store = MockStore::new(None);
        let publisher = SecretRotationPublisher::new(&store, SECRET_NAME);

        let outcome = publisher.publish_if_rotated(&tokens(Some("R2"))).await;

        assert!(outcome.is_failed());
        assert!(matches!(
            outcome,
            PublishOutcome::Failed {
                kind: SecretPublishErrorKind::UnexpectedStatus(403),
                ..
            }
        ));
    }
}
