//! One posting run: pick an unposted trending repository, draft, post, record.

use crate::error::Error;
use crate::trending::{
    fallback_text, post_text, PostComposer, PostLedger, SocialPoster, TrendingRepository,
    TrendingSource,
};
use log::*;
use social_auth::secrets::PublishOutcome;

#[derive(Debug, PartialEq)]
pub enum RunReport {
    NothingToPost,
    AllPosted,
    Posted {
        repository: TrendingRepository,
        status_id: String,
        rotation: PublishOutcome,
        /// Problems that did not stop the post, for the operator to act on.
        warnings: Vec<String>,
    },
}

pub struct Pipeline<T, L, C, S> {
    source: T,
    ledger: L,
    composer: C,
    poster: S,
}

impl<T, L, C, S> Pipeline<T, L, C, S>
where
    T: TrendingSource,
    L: PostLedger,
    C: PostComposer,
    S: SocialPoster,
{
    pub fn new(source: T, ledger: L, composer: C, poster: S) -> Self {
        Self {
            source,
            ledger,
            composer,
            poster,
        }
    }

    /// Run once. Credential and post failures abort; everything else degrades.
    pub async fn run(&self) -> Result<RunReport, Error> {
        let trending = self.source.trending().await?;
        if trending.is_empty() {
            info!("No trending repositories found");
            return Ok(RunReport::NothingToPost);
        }

        let Some(repository) = self.first_unposted(trending).await else {
            info!("All trending repositories have already been posted");
            return Ok(RunReport::AllPosted);
        };
        info!("Selected repository: {}", repository.name);

        let text = self.compose(&repository).await;

        let rotation = self.poster.connect().await?;
        let mut warnings = Vec::new();
        if let PublishOutcome::Failed { reason, .. } = &rotation {
            warnings.push(format!("Rotated refresh token was not persisted: {}", reason));
        }

        let status = self.poster.post(&post_text(&text, &repository)).await?;

        if let Err(e) = self.ledger.record(&repository).await {
            warn!("Failed to record posted repository {}: {}", repository.name, e);
            warnings.push(format!("Posted repository was not recorded: {}", e));
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(RunReport::Posted {
            repository,
            status_id: status.id,
            rotation,
            warnings,
        })
    }

    async fn first_unposted(&self, trending: Vec<TrendingRepository>) -> Option<TrendingRepository> {
        for repository in trending {
            match self.ledger.is_posted(&repository.name).await {
                Ok(true) => debug!("Already posted: {}", repository.name),
                Ok(false) => return Some(repository),
                // An unreadable ledger must not block posting.
                Err(e) => {
                    warn!("Ledger lookup failed for {}: {}", repository.name, e);
                    return Some(repository);
                }
            }
        }
        None
    }

    async fn compose(&self, repository: &TrendingRepository) -> String {
        match self.composer.compose(repository).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Composer returned empty text, using fallback");
                fallback_text(repository)
            }
            Err(e) => {
                warn!("Failed to compose post text, using fallback: {}", e);
                fallback_text(repository)
            }
        }
    }
}
