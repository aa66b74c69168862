//! Client authentication mode resolution.
//!
//! The mode is resolved once, when configuration is loaded, into a
//! [`ClientCredentials`] variant. Both the code exchange and every refresh take
//! that variant, so they always agree on how the token endpoint is called.

use std::fmt;

use secrecy::SecretString;
use tracing::warn;

use crate::error::{configuration_error, ConfigurationErrorKind, Error};

/// How the client authenticates to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// Public client: `client_id` in the body, PKCE verifier as proof.
    Pkce,
    /// Confidential client: HTTP Basic `client_id:client_secret`.
    Confidential,
}

impl FlowMode {
    /// Explicit override wins; otherwise a client secret implies confidential mode.
    pub fn resolve(has_client_secret: bool, explicit: Option<FlowMode>) -> FlowMode {
        match explicit {
            Some(mode) => mode,
            None if has_client_secret => FlowMode::Confidential,
            None => FlowMode::Pkce,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowMode::Pkce => "pkce",
            FlowMode::Confidential => "confidential",
        }
    }
}

impl fmt::Display for FlowMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw client configuration as loaded from the environment.
#[derive(Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: Option<SecretString>,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, client_secret: Option<SecretString>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Validate the identity and fix the authentication mode.
    pub fn into_credentials(self, explicit: Option<FlowMode>) -> Result<ClientCredentials, Error> {
        let client_id = self.client_id.trim().to_string();
        if client_id.is_empty() {
            return Err(configuration_error(
                ConfigurationErrorKind::MissingParameter,
                "client_id is required",
            ));
        }

        let has_secret = self.client_secret.is_some();
        match FlowMode::resolve(has_secret, explicit) {
            FlowMode::Pkce => {
                if has_secret {
                    warn!("Client secret is configured but the flow is forced to pkce; ignoring it");
                }
                Ok(ClientCredentials::Public { client_id })
            }
            FlowMode::Confidential => match self.client_secret {
                Some(client_secret) => Ok(ClientCredentials::Confidential {
                    client_id,
                    client_secret,
                }),
                None => Err(configuration_error(
                    ConfigurationErrorKind::MissingParameter,
                    "client_secret is required for the confidential flow",
                )),
            },
        }
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A client whose authentication mode has been decided.
#[derive(Clone)]
pub enum ClientCredentials {
    Public {
        client_id: String,
    },
    Confidential {
        client_id: String,
        client_secret: SecretString,
    },
}

impl ClientCredentials {
    pub fn mode(&self) -> FlowMode {
        match self {
            ClientCredentials::Public { .. } => FlowMode::Pkce,
            ClientCredentials::Confidential { .. } => FlowMode::Confidential,
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            ClientCredentials::Public { client_id } => client_id,
            ClientCredentials::Confidential { client_id, .. } => client_id,
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("mode", &self.mode())
            .field("client_id", &self.client_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_resolve_infers_from_secret_presence() {
        assert_eq!(FlowMode::resolve(true, None), FlowMode::Confidential);
        assert_eq!(FlowMode::resolve(false, None), FlowMode::Pkce);
    }

    #[test]
    fn test_resolve_explicit_override_wins() {
        for has_secret in [true, false] {
            assert_eq!(
                FlowMode::resolve(has_secret, Some(FlowMode::Pkce)),
                FlowMode::Pkce
            );
            assert_eq!(
                FlowMode::resolve(has_secret, Some(FlowMode::Confidential)),
                FlowMode::Confidential
            );
        }
    }

    #[test]
    fn test_into_credentials_confidential() {
        let identity = ClientIdentity::new("id", Some(SecretString::from("secret".to_string())));
        let credentials = identity.into_credentials(None).unwrap();
        assert_eq!(credentials.mode(), FlowMode::Confidential);
        assert_eq!(credentials.client_id(), "id");
    }

    #[test]
    fn test_into_credentials_forced_pkce_drops_secret() {
        let identity = ClientIdentity::new("id", Some(SecretString::from("secret".to_string())));
        let credentials = identity.into_credentials(Some(FlowMode::Pkce)).unwrap();
        assert!(matches!(credentials, ClientCredentials::Public { .. }));
    }

    #[test]
    fn test_into_credentials_confidential_without_secret_fails() {
        let identity = ClientIdentity::new("id", None);
        let err = identity
            .into_credentials(Some(FlowMode::Confidential))
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Configuration(ConfigurationErrorKind::MissingParameter)
        );
    }

    #[test]
    fn test_into_credentials_requires_client_id() {
        let err = ClientIdentity::new("  ", None).into_credentials(None).unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Configuration(ConfigurationErrorKind::MissingParameter)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let identity = ClientIdentity::new("id", Some(SecretString::from("hunter2".to_string())));
        assert!(!format!("{:?}", identity).contains("hunter2"));
    }
}
