//! Interfaces of the collaborators around the posting pipeline.
//!
//! Scraping, text generation and the posted-repository ledger live outside this
//! workspace; only their contracts are defined here.

use crate::error::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingRepository {
    /// `owner/name`
    pub name: String,
    pub url: String,
    pub description: String,
    pub stars: String,
    pub language: String,
}

/// A post accepted by the social platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedStatus {
    pub id: String,
}

#[async_trait]
pub trait TrendingSource: Send + Sync {
    async fn trending(&self) -> Result<Vec<TrendingRepository>, Error>;
}

/// Record of repositories that have already been posted.
#[async_trait]
pub trait PostLedger: Send + Sync {
    async fn is_posted(&self, name: &str) -> Result<bool, Error>;

    async fn record(&self, repository: &TrendingRepository) -> Result<(), Error>;
}

#[async_trait]
pub trait PostComposer: Send + Sync {
    /// Draft the post body. The repository URL is appended by the pipeline.
    async fn compose(&self, repository: &TrendingRepository) -> Result<String, Error>;
}

#[async_trait]
pub trait SocialPoster: Send + Sync {
    /// Resolve credentials before posting and report the rotation outcome.
    async fn connect(&self) -> Result<social_auth::secrets::PublishOutcome, Error>;

    async fn post(&self, text: &str) -> Result<PostedStatus, Error>;
}

/// Post text used when composition fails or yields nothing.
pub fn fallback_text(repository: &TrendingRepository) -> String {
    format!(
        "🔥 GitHubトレンド: {}\n\n{}\n\n#GitHub #{} #OpenSource",
        repository.name, repository.description, repository.language
    )
}

/// Final post body: the drafted text followed by the repository link.
pub fn post_text(text: &str, repository: &TrendingRepository) -> String {
    format!("{}\n\n🔗 {}", text.trim(), repository.url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> TrendingRepository {
        TrendingRepository {
            name: "octo/rocket".to_string(),
            url: "https://github.com/octo/rocket".to_string(),
            description: "Fast things".to_string(),
            stars: "1,234".to_string(),
            language: "Rust".to_string(),
        }
    }

    #[test]
    fn test_fallback_text() {
        assert_eq!(
            fallback_text(&repository()),
            "🔥 GitHubトレンド: octo/rocket\n\nFast things\n\n#GitHub #Rust #OpenSource"
        );
    }

    #[test]
    fn test_post_text_appends_link() {
        assert_eq!(
            post_text("Drafted text\n", &repository()),
            "Drafted text\n\n🔗 https://github.com/octo/rocket"
        );
    }
}
