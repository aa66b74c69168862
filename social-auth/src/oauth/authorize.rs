//! Authorization URL construction for the user-facing consent step.

use rand::Rng;
use url::Url;

use super::pkce::{PkceChallenge, PkcePair, CODE_CHALLENGE_METHOD};

/// Authorization request with URL and the PKCE pair it was built from.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization URL to send the user to.
    pub url: Url,
    /// CSRF state parameter, also the key the verifier is stored under.
    pub state: String,
    /// PKCE pair; the verifier must be persisted for the exchange step.
    pub pkce: PkcePair,
}

impl AuthorizationRequest {
    /// Generate a fresh PKCE pair (and state, unless one is supplied) and build the URL.
    pub fn new(
        authorize_endpoint: &Url,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        state: Option<String>,
    ) -> Self {
        let pkce = PkcePair::generate();
        let state = state.unwrap_or_else(generate_state);
        let url = authorization_url(
            authorize_endpoint,
            client_id,
            redirect_uri,
            scope,
            &state,
            pkce.challenge(),
        );

        Self { url, state, pkce }
    }
}

/// Deterministically assemble the authorization endpoint URL.
pub fn authorization_url(
    authorize_endpoint: &Url,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
    challenge: &PkceChallenge,
) -> Url {
    let mut url = authorize_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", scope)
        .append_pair("state", state)
        .append_pair("code_challenge", challenge.as_str())
        .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
    url
}

/// Generate a cryptographically random state token.
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(random_bytes)
}
