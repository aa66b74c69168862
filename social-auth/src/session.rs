//! Run-scoped credential session.
//!
//! The session is the only entry point the posting side needs: the first
//! [`CredentialSession::get_client`] call refreshes the access token (publishing
//! a rotated refresh token on the way) and every later call returns the same
//! client. Build one session per process run; never share it across runs.

use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::Error;
use crate::http::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};
use crate::oauth::token::{RefreshCoordinator, RefreshOutcome, TokenPair};
use crate::oauth::ClientCredentials;
use crate::secrets::{PublishOutcome, RotationPublisher};

/// Client and token state resolved by the first successful refresh.
#[derive(Debug)]
pub struct AuthenticatedSession {
    client: AuthenticatedClient,
    tokens: TokenPair,
    rotation: PublishOutcome,
}

impl AuthenticatedSession {
    /// HTTP client carrying the bearer access token.
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// What happened to the rotated refresh token, if any.
    pub fn rotation(&self) -> &PublishOutcome {
        &self.rotation
    }
}

pub struct CredentialSession<P: RotationPublisher> {
    coordinator: RefreshCoordinator<P>,
    credentials: ClientCredentials,
    stored_refresh_token: Option<SecretString>,
    http: HttpClientConfig,
    session: OnceCell<AuthenticatedSession>,
}

impl<P: RotationPublisher> CredentialSession<P> {
    pub fn new(
        coordinator: RefreshCoordinator<P>,
        credentials: ClientCredentials,
        stored_refresh_token: Option<SecretString>,
        http: HttpClientConfig,
    ) -> Self {
        Self {
            coordinator,
            credentials,
            stored_refresh_token,
            http,
            session: OnceCell::new(),
        }
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    /// Resolve the authenticated session, refreshing on first use only.
    pub async fn get_client(&self) -> Result<&AuthenticatedSession, Error> {
        if let Some(session) = self.session.get() {
            debug!("Using cached credential session");
            return Ok(session);
        }

        self.session
            .get_or_try_init(|| async {
                let RefreshOutcome { tokens, rotation } = self
                    .coordinator
                    .refresh(self.stored_refresh_token.as_ref(), &self.credentials)
                    .await?;

                let client = AuthenticatedClientBuilder::from_config(self.http.clone())
                    .with_bearer_token(tokens.access_token.clone())
                    .build()?;

                info!(
                    "Credential session ready ({} client, rotation: {:?})",
                    self.credentials.mode(),
                    rotation
                );
                Ok::<_, Error>(AuthenticatedSession {
                    client,
                    tokens,
                    rotation,
                })
            })
            .await
    }
}
