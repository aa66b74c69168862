//! HTTP client building.

mod client;

pub use client::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};
