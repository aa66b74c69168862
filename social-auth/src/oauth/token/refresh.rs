//! Refresh coordinator: one refresh per run, rotation published before return.

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::endpoint::TokenEndpoint;
use super::tokens::{mask_token, TokenPair};
use crate::error::{configuration_error, ConfigurationErrorKind, Error, ErrorKind};
use crate::oauth::flow::ClientCredentials;
use crate::secrets::{PublishOutcome, RotationPublisher, SkipReason};

/// New tokens plus what happened to the rotated refresh token.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub tokens: TokenPair,
    pub rotation: PublishOutcome,
}

/// Lifecycle of the refresh within one run.
#[derive(Debug, Clone)]
pub enum RefreshState {
    /// No refresh attempted yet.
    Idle,
    /// Token endpoint call (and rotation publish) in flight.
    Refreshing,
    /// Access token available for the rest of the run.
    Ready(RefreshOutcome),
    /// Terminal for this run; later calls replay the failure without a request.
    Failed { kind: ErrorKind, reason: String },
}

impl RefreshState {
    pub fn name(&self) -> &'static str {
        match self {
            RefreshState::Idle => "idle",
            RefreshState::Refreshing => "refreshing",
            RefreshState::Ready(_) => "ready",
            RefreshState::Failed { .. } => "failed",
        }
    }
}

/// Obtains a new access token from the stored refresh token, at most once per run.
///
/// A rejected refresh is never retried: providers with reuse detection revoke
/// the whole grant when an already used refresh token is presented again.
pub struct RefreshCoordinator<P: RotationPublisher> {
    endpoint: TokenEndpoint,
    publisher: P,
    state: Mutex<RefreshState>,
}

impl<P: RotationPublisher> RefreshCoordinator<P> {
    pub fn new(endpoint: TokenEndpoint, publisher: P) -> Self {
        Self {
            endpoint,
            publisher,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Current state snapshot.
    pub async fn state(&self) -> RefreshState {
        self.state.lock().await.clone()
    }

    /// Refresh the access token.
    ///
    /// On success a rotated refresh token is handed to the publisher before this
    /// returns. Only the first call talks to the network; later calls return the
    /// cached outcome or the cached failure.
    pub async fn refresh(
        &self,
        stored_refresh_token: Option<&SecretString>,
        credentials: &ClientCredentials,
    ) -> Result<RefreshOutcome, Error> {
        let mut state = self.state.lock().await;

        match &*state {
            RefreshState::Ready(outcome) => {
                debug!("Reusing access token refreshed earlier in this run");
                return Ok(outcome.clone());
            }
            RefreshState::Failed { kind, reason } => {
                return Err(Error {
                    source: Some(format!("refresh already failed in this run: {}", reason).into()),
                    error_kind: kind.clone(),
                });
            }
            RefreshState::Idle | RefreshState::Refreshing => {}
        }

        let refresh_token = match stored_refresh_token {
            Some(token) if !token.expose_secret().trim().is_empty() => token,
            _ => {
                let err = configuration_error(
                    ConfigurationErrorKind::MissingRefreshToken,
                    "no stored refresh token; run the authorization exchange to obtain one",
                );
                *state = RefreshState::Failed {
                    kind: err.error_kind.clone(),
                    reason: err.to_string(),
                };
                return Err(err);
            }
        };

        *state = RefreshState::Refreshing;
        debug!(
            "Refreshing with stored refresh token {}",
            mask_token(refresh_token.expose_secret())
        );

        let tokens = match self.endpoint.refresh(refresh_token, credentials).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("Token refresh failed; re-authorization is required: {}", e);
                *state = RefreshState::Failed {
                    kind: e.error_kind.clone(),
                    reason: e.to_string(),
                };
                return Err(e);
            }
        };

        let rotation = if tokens.rotated_refresh_token(refresh_token).is_some() {
            info!("Authorization server rotated the refresh token; publishing before continuing");
            self.publisher.publish_if_rotated(&tokens).await
        } else {
            PublishOutcome::Skipped(SkipReason::NotRotated)
        };

        let outcome = RefreshOutcome { tokens, rotation };
        *state = RefreshState::Ready(outcome.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenEndpointErrorKind;
    use crate::http::HttpClientConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPublisher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RotationPublisher for &CountingPublisher {
        async fn publish_if_rotated(&self, tokens: &TokenPair) -> PublishOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(tokens.refresh_token.is_some());
            PublishOutcome::Published {
                key_id: "K1".to_string(),
                status: crate::secrets::UpsertStatus::Updated,
            }
        }
    }

    fn public() -> ClientCredentials {
        ClientCredentials::Public {
            client_id: "client-123".to_string(),
        }
    }

    fn coordinator<'a>(
        server: &mockito::ServerGuard,
        publisher: &'a CountingPublisher,
    ) -> RefreshCoordinator<&'a CountingPublisher> {
        let endpoint = TokenEndpoint::new(
            format!("{}/2/oauth2/token", server.url()),
            &HttpClientConfig::default(),
        )
        .unwrap();
        RefreshCoordinator::new(endpoint, publisher)
    }

    #[tokio::test]
    async fn test_refresh_happens_once_per_run() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A1","expires_in":7200}"#)
            .expect(1)
            .create_async()
            .await;

        let publisher = CountingPublisher::default();
        let coordinator = coordinator(&server, &publisher);
        let stored = SecretString::from("R1".to_string());

        assert_eq!(coordinator.state().await.name(), "idle");
        for _ in 0..3 {
            let outcome = coordinator.refresh(Some(&stored), &public()).await.unwrap();
            assert_eq!(outcome.tokens.access_token.expose_secret(), "A1");
        }
        assert_eq!(coordinator.state().await.name(), "ready");

        mock.assert_async().await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rotation_is_published_before_return() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A2","refresh_token":"R2"}"#)
            .create_async()
            .await;

        let publisher = CountingPublisher::default();
        let coordinator = coordinator(&server, &publisher);
        let stored = SecretString::from("R1".to_string());

        let outcome = coordinator.refresh(Some(&stored), &public()).await.unwrap();

        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome.rotation, PublishOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn test_unchanged_refresh_token_is_not_published() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A2","refresh_token":"R1"}"#)
            .create_async()
            .await;

        let publisher = CountingPublisher::default();
        let coordinator = coordinator(&server, &publisher);
        let stored = SecretString::from("R1".to_string());

        let outcome = coordinator.refresh(Some(&stored), &public()).await.unwrap();

        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.rotation, PublishOutcome::Skipped(SkipReason::NotRotated));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2/oauth2/token")
            .expect(0)
            .create_async()
            .await;

        let publisher = CountingPublisher::default();
        let coordinator = coordinator(&server, &publisher);
        let blank = SecretString::from("  ".to_string());

        for stored in [None, Some(&blank)] {
            let err = coordinator.refresh(stored, &public()).await.unwrap_err();
            assert_eq!(
                err.error_kind,
                ErrorKind::Configuration(ConfigurationErrorKind::MissingRefreshToken)
            );
        }
        assert_eq!(coordinator.state().await.name(), "failed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#)
            .expect(1)
            .create_async()
            .await;

        let publisher = CountingPublisher::default();
        let coordinator = coordinator(&server, &publisher);
        let stored = SecretString::from("R1".to_string());

        let first = coordinator.refresh(Some(&stored), &public()).await.unwrap_err();
        let second = coordinator.refresh(Some(&stored), &public()).await.unwrap_err();

        assert_eq!(first.oauth_error_code(), Some("invalid_grant"));
        assert_eq!(first.error_kind, second.error_kind);
        assert!(matches!(
            second.error_kind,
            ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Rejected { status: 400, .. })
        ));
        mock.assert_async().await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }
}
