//! Builds the credential lifecycle from configuration and runs its operator commands.

use crate::error::{config_error, DomainErrorKind, Error, InternalErrorKind};
use crate::gateway::x::XPoster;
use log::*;
use service::config::{Config, OAuthFlow};
use social_auth::http::HttpClientConfig;
use social_auth::oauth::token::{RefreshCoordinator, TokenEndpoint, TokenPair};
use social_auth::oauth::{
    AuthorizationRequest, ClientCredentials, ClientIdentity, FlowMode, PendingAuthorization,
    PendingAuthorizationStore, PkceVerifier,
};
use social_auth::secrets::{
    PublishOutcome, RepositorySecretStore, RotationPublisher, SecretRotationPublisher,
};
use social_auth::CredentialSession;
use url::Url;

pub type Publisher = SecretRotationPublisher<RepositorySecretStore>;
pub type Session = CredentialSession<Publisher>;

/// Tokens from a code exchange and what happened to their refresh token.
#[derive(Debug)]
pub struct ExchangeReport {
    pub tokens: TokenPair,
    pub rotation: PublishOutcome,
}

pub fn http_config(config: &Config) -> HttpClientConfig {
    HttpClientConfig::with_timeout(config.http_timeout())
}

fn flow_mode(flow: OAuthFlow) -> FlowMode {
    match flow {
        OAuthFlow::Pkce => FlowMode::Pkce,
        OAuthFlow::Confidential => FlowMode::Confidential,
    }
}

/// Resolve the client's authentication mode once, for every command.
pub fn client_credentials(config: &Config) -> Result<ClientCredentials, Error> {
    let client_id = config
        .client_id()
        .ok_or_else(|| config_error("X_CLIENT_ID is required"))?;

    let credentials = ClientIdentity::new(client_id, config.client_secret())
        .into_credentials(config.x_oauth2_flow.map(flow_mode))?;

    debug!("Resolved {} client", credentials.mode());
    Ok(credentials)
}

/// Publisher writing rotated refresh tokens to the configured repository secret.
pub fn rotation_publisher(config: &Config) -> Result<Publisher, Error> {
    let (owner, repo) = config
        .repository_parts()
        .ok_or_else(|| config_error("GITHUB_REPOSITORY must be set as owner/repo"))?;
    let token = config
        .github_token()
        .ok_or_else(|| config_error("GITHUB_TOKEN is required to publish the refresh token"))?;

    let store = RepositorySecretStore::new(
        config.github_api_url(),
        owner,
        repo,
        token,
        &http_config(config),
    )?;

    Ok(
        SecretRotationPublisher::new(store, config.refresh_token_secret_name())
            .with_dry_run(config.rotation_dry_run),
    )
}

/// Build the run-scoped credential session. No network call is made until first use.
pub fn credential_session(config: &Config) -> Result<Session, Error> {
    let credentials = client_credentials(config)?;
    let publisher = rotation_publisher(config)?;
    let http = http_config(config);
    let endpoint = TokenEndpoint::new(config.token_url(), &http)?;

    Ok(CredentialSession::new(
        RefreshCoordinator::new(endpoint, publisher),
        credentials,
        config.refresh_token(),
        http,
    ))
}

/// Post client for the configured API, authenticated through a fresh credential session.
pub fn x_poster(config: &Config) -> Result<XPoster<Publisher>, Error> {
    Ok(XPoster::new(
        credential_session(config)?,
        config.api_base_url(),
    ))
}

/// Start an authorization: generate the PKCE pair and persist it under `state`.
pub fn authorize(config: &Config, state: Option<String>) -> Result<AuthorizationRequest, Error> {
    let credentials = client_credentials(config)?;
    let redirect_uri = config
        .redirect_uri()
        .ok_or_else(|| config_error("X_REDIRECT_URI is required to authorize"))?;
    let endpoint = Url::parse(config.authorize_url()).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
    })?;

    let request = AuthorizationRequest::new(
        &endpoint,
        credentials.client_id(),
        redirect_uri,
        config.scope(),
        state,
    );

    let store = PendingAuthorizationStore::new(config.pkce_state_path());
    store.save(&PendingAuthorization::from_request(
        &request,
        credentials.client_id(),
        redirect_uri,
        config.scope(),
    ))?;

    info!(
        "Stored pending authorization for state {} in {}",
        request.state,
        store.path().display()
    );
    Ok(request)
}

/// Exchange an authorization code, discard its verifier and publish the refresh token.
///
/// The pending authorization is looked up by `state`, or the latest one when no
/// state is given. Without one, `X_CODE_VERIFIER` supplies the verifier. In the
/// confidential flow both are optional.
pub async fn exchange_code(
    config: &Config,
    code: &str,
    state: Option<&str>,
) -> Result<ExchangeReport, Error> {
    let credentials = client_credentials(config)?;
    let publisher = rotation_publisher(config)?;

    let store = PendingAuthorizationStore::new(config.pkce_state_path());
    let pending = match state {
        Some(state) => store.load(state)?,
        None => store.latest()?,
    };

    match &pending {
        Some(pending) if pending.client_id != credentials.client_id() => warn!(
            "Pending authorization {} was started for a different client ID",
            pending.state
        ),
        Some(_) => {}
        None if config.code_verifier().is_some() => info!(
            "No pending authorization found in {}, using X_CODE_VERIFIER",
            store.path().display()
        ),
        None => warn!(
            "No pending authorization found in {}",
            store.path().display()
        ),
    }

    // The redirect_uri must match the one the authorization was started with.
    let redirect_uri = pending
        .as_ref()
        .map(|pending| pending.redirect_uri.as_str())
        .or_else(|| config.redirect_uri())
        .ok_or_else(|| config_error("X_REDIRECT_URI is required for the code exchange"))?;
    let verifier = match &pending {
        Some(pending) => pending.verifier(),
        None => config
            .code_verifier()
            .map(PkceVerifier::parse)
            .transpose()?,
    };

    let endpoint = TokenEndpoint::new(config.token_url(), &http_config(config))?;
    let tokens = endpoint
        .exchange(code, verifier, redirect_uri, &credentials)
        .await?;

    if let Some(pending) = &pending {
        if let Err(e) = store.discard(&pending.state) {
            warn!("Failed to discard used code verifier: {}", e);
        }
    }

    let rotation = publisher.publish_if_rotated(&tokens).await;
    Ok(ExchangeReport { tokens, rotation })
}

/// Drive the credential session once and report the rotation outcome.
pub async fn refresh(config: &Config) -> Result<PublishOutcome, Error> {
    let session = credential_session(config)?;
    let resolved = session.get_client().await?;

    match resolved.tokens().expires_at() {
        Some(expires_at) => info!("Access token valid until {}", expires_at),
        None => info!("Access token obtained (no expiry reported)"),
    }
    Ok(resolved.rotation().clone())
}
