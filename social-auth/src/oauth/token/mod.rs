//! Token endpoint access and the per-run refresh coordinator.

mod endpoint;
mod refresh;
mod tokens;

pub use endpoint::TokenEndpoint;
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshState};
pub use tokens::{mask_token, TokenPair};
