//! Persistence of rotated refresh tokens in a remote secret store.
//!
//! The refresh token is the only credential that survives between runs. When
//! the authorization server rotates it, the new value is sealed against the
//! store's public key and written back before the run continues.

mod publisher;
mod sealing;
mod store;

pub use publisher::{PublishOutcome, RotationPublisher, SecretRotationPublisher, SkipReason};
pub use sealing::{seal, SealedSecret, StorePublicKey};
pub use store::{RepositorySecretStore, SecretStore, UpsertStatus};
