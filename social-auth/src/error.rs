//! Error types for the `social-auth` crate.
//!
//! Follows the same pattern as `domain::error` with a root Error struct and error kind enums.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for social-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in social-auth.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    Configuration(ConfigurationErrorKind),
    TokenEndpoint(TokenEndpointErrorKind),
    SecretPublish(SecretPublishErrorKind),
    PendingState(PendingStateErrorKind),
    Http(HttpErrorKind),
}

/// Missing or contradictory inputs, detected before any network call.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationErrorKind {
    MissingParameter,
    MissingRefreshToken,
    InvalidValue,
}

/// Failures talking to the authorization server's token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEndpointErrorKind {
    /// Non-2xx response. Carries the provider's OAuth error fields when present.
    Rejected {
        status: u16,
        error: Option<String>,
        description: Option<String>,
        access_level: Option<String>,
    },
    InvalidResponse,
    Network,
}

/// Failures persisting a rotated refresh token to the secret store.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretPublishErrorKind {
    KeyFetchFailed,
    InvalidPublicKey,
    SealFailed,
    UnexpectedStatus(u16),
    Network,
}

/// Errors from the durable pending-authorization file.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingStateErrorKind {
    Io,
    Malformed,
}

/// Errors from HTTP client construction.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
}

impl Error {
    /// True for errors that must abort the run.
    ///
    /// Secret publish failures are the only non-fatal category: the current run
    /// already holds a usable access token.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.error_kind, ErrorKind::SecretPublish(_))
    }

    /// The provider's OAuth `error` code, if the token endpoint returned one.
    pub fn oauth_error_code(&self) -> Option<&str> {
        match &self.error_kind {
            ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Rejected { error, .. }) => {
                error.as_deref()
            }
            _ => None,
        }
    }
}

impl fmt::Display for TokenEndpointErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenEndpointErrorKind::Rejected {
                status,
                error,
                description,
                access_level,
            } => {
                write!(f, "rejected with status {}", status)?;
                if let Some(error) = error {
                    write!(f, " error={}", error)?;
                }
                if let Some(description) = description {
                    write!(f, " description={}", description)?;
                }
                if let Some(access_level) = access_level {
                    write!(f, " x-access-level={}", access_level)?;
                }
                Ok(())
            }
            TokenEndpointErrorKind::InvalidResponse => write!(f, "invalid response"),
            TokenEndpointErrorKind::Network => write!(f, "network failure"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Configuration(kind) => write!(f, "Configuration error: {:?}", kind)?,
            ErrorKind::TokenEndpoint(kind) => write!(f, "Token endpoint error: {}", kind)?,
            ErrorKind::SecretPublish(kind) => write!(f, "Secret publish error: {:?}", kind)?,
            ErrorKind::PendingState(kind) => write!(f, "Pending authorization error: {:?}", kind)?,
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
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

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Http(HttpErrorKind::BuilderFailed),
        }
    }
}

/// Helper function to create configuration errors.
pub fn configuration_error(kind: ConfigurationErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Configuration(kind),
    }
}

/// Helper function to create token endpoint errors.
pub fn token_endpoint_error(kind: TokenEndpointErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::TokenEndpoint(kind),
    }
}

/// Helper function to create secret publish errors.
pub fn secret_publish_error(kind: SecretPublishErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::SecretPublish(kind),
    }
}

/// Helper function to create pending-authorization state errors.
pub fn pending_state_error(
    kind: PendingStateErrorKind,
    source: impl StdError + Send + Sync + 'static,
) -> Error {
    Error {
        source: Some(Box::new(source)),
        error_kind: ErrorKind::PendingState(kind),
    }
}
