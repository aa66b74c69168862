//! Error types for the `domain` layer.
use social_auth::error::{
    Error as SocialAuthError, ErrorKind as SocialAuthErrorKind, SecretPublishErrorKind,
    TokenEndpointErrorKind,
};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums. The `source` field holds the lower-layer error that caused it, so the
/// binary can print the whole chain without depending on `social_auth` directly.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Errors caused by this process: configuration, local state, client construction.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Other(String),
}

/// Errors reported by a remote service.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    /// The authorization server or API refused our credentials or their scope.
    Auth,
    Other(String),
}

impl Error {
    pub fn is_config(&self) -> bool {
        self.error_kind == DomainErrorKind::Internal(InternalErrorKind::Config)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {:?}", self.error_kind)?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Helper for configuration errors detected in this layer.
pub(crate) fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

// This is where errors from the credential lifecycle are translated to the `domain` layer.
impl From<SocialAuthError> for Error {
    fn from(err: SocialAuthError) -> Self {
        let error_kind = match &err.error_kind {
            SocialAuthErrorKind::Configuration(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Config)
            }
            SocialAuthErrorKind::PendingState(_) => DomainErrorKind::Internal(
                InternalErrorKind::Other("Pending authorization state error".to_string()),
            ),
            SocialAuthErrorKind::Http(_) => DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to build reqwest client".to_string(),
            )),
            SocialAuthErrorKind::TokenEndpoint(TokenEndpointErrorKind::Network)
            | SocialAuthErrorKind::SecretPublish(SecretPublishErrorKind::Network) => {
                DomainErrorKind::External(ExternalErrorKind::Network)
            }
            SocialAuthErrorKind::TokenEndpoint(_) => {
                DomainErrorKind::External(ExternalErrorKind::Auth)
            }
            SocialAuthErrorKind::SecretPublish(_) => DomainErrorKind::External(
                ExternalErrorKind::Other("Secret store error".to_string()),
            ),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
