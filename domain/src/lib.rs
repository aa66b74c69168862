//! Re-exports the credential outcome types from the `social_auth` crate.
//!
//! Consumers of the `domain` crate inspect rotation results without depending on
//! `social_auth` directly.
pub use social_auth::secrets::{PublishOutcome, SkipReason};

pub mod credentials;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod trending;
