//! Social platform post client over the run's credential session.

use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::trending::{PostedStatus, SocialPoster};
use async_trait::async_trait;
use log::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use social_auth::secrets::{PublishOutcome, RotationPublisher};
use social_auth::CredentialSession;

const ACCESS_LEVEL_HEADER: &str = "x-access-level";

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

/// Problem details the API returns on rejected requests.
#[derive(Debug, Default, Deserialize)]
struct ApiProblem {
    title: Option<String>,
    detail: Option<String>,
}

pub struct XPoster<P: RotationPublisher> {
    session: CredentialSession<P>,
    base_url: String,
}

impl<P: RotationPublisher> XPoster<P> {
    pub fn new(session: CredentialSession<P>, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl<P: RotationPublisher> SocialPoster for XPoster<P> {
    async fn connect(&self) -> Result<PublishOutcome, Error> {
        let resolved = self.session.get_client().await?;
        Ok(resolved.rotation().clone())
    }

    async fn post(&self, text: &str) -> Result<PostedStatus, Error> {
        let client = self.session.get_client().await?.client();
        let url = format!("{}/2/tweets", self.base_url);

        let response = client
            .post(&url)
            .json(&CreatePostRequest { text })
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to send post request: {e:?}");
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let created: CreatePostResponse = response.json().await?;
            info!("Post published: {}", created.data.id);
            return Ok(PostedStatus {
                id: created.data.id,
            });
        }

        let access_level = response
            .headers()
            .get(ACCESS_LEVEL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let problem: ApiProblem = serde_json::from_str(&body).unwrap_or_default();
        let message = rejection_message(status, access_level.as_deref(), &problem, &body);
        error!("{}", message);

        let error_kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DomainErrorKind::External(ExternalErrorKind::Auth)
            }
            _ => DomainErrorKind::External(ExternalErrorKind::Other(format!(
                "Post rejected with status {}",
                status.as_u16()
            ))),
        };
        Err(Error {
            source: Some(message.into()),
            error_kind,
        })
    }
}

fn rejection_message(
    status: StatusCode,
    access_level: Option<&str>,
    problem: &ApiProblem,
    body: &str,
) -> String {
    let mut message = format!("Post rejected with status {}", status.as_u16());
    if let Some(access_level) = access_level {
        message.push_str(&format!("; x-access-level: {}", access_level));
    }
    match problem.detail.as_deref().or(problem.title.as_deref()) {
        Some(detail) => message.push_str(&format!("; detail: {}", detail)),
        None if !body.is_empty() => message.push_str(&format!("; body: {}", body)),
        None => {}
    }
    if status == StatusCode::FORBIDDEN {
        message.push_str(
            ". Hint: the app needs Read and write permission and the token the tweet.write scope; \
             re-authorize to obtain a new refresh token",
        );
    }
    message
}
