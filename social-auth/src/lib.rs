//! # social-auth
//!
//! Credential lifecycle for the social platform API:
//! - PKCE pair generation, authorization URLs and pending-authorization state
//! - Flow resolution between public (PKCE) and confidential clients
//! - Authorization-code exchange and single-shot token refresh
//! - Sealing and publishing a rotated refresh token to the repository secret store
//! - A run-scoped [`CredentialSession`] handing out an authenticated HTTP client
//!
//! ## Usage
//!
//! ```rust,ignore
//! use social_auth::{
//!     oauth::{token::{RefreshCoordinator, TokenEndpoint}, ClientIdentity},
//!     secrets::{RepositorySecretStore, SecretRotationPublisher},
//!     CredentialSession,
//! };
//! ```

pub mod error;
pub mod http;
pub mod oauth;
pub mod secrets;
pub mod session;

pub use error::{Error, ErrorKind};
pub use session::{AuthenticatedSession, CredentialSession};
