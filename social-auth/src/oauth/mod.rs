//! OAuth 2.0 authorization-code flow with PKCE, for public and confidential clients.

mod authorize;
mod flow;
mod pkce;
mod state;

pub mod token;

pub use authorize::{authorization_url, generate_state, AuthorizationRequest};
pub use flow::{ClientCredentials, ClientIdentity, FlowMode};
pub use pkce::{PkceChallenge, PkcePair, PkceVerifier, CODE_CHALLENGE_METHOD};
pub use state::{PendingAuthorization, PendingAuthorizationStore};
