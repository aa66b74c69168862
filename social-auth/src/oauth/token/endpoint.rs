//! Token endpoint client for the authorization-code and refresh-token grants.
//!
//! The request shape depends on the resolved client mode:
//!
//! | grant | public (PKCE) | confidential |
//! |---|---|---|
//! | `authorization_code` | body `client_id` + `code_verifier`, no auth header | Basic header, no `client_id`, `code_verifier` if present |
//! | `refresh_token` | body `client_id`, no auth header | Basic header, no `client_id` |

use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::tokens::{TokenErrorResponse, TokenPair, TokenResponse};
use crate::error::{
    configuration_error, token_endpoint_error, ConfigurationErrorKind, Error, ErrorKind,
    TokenEndpointErrorKind,
};
use crate::http::HttpClientConfig;
use crate::oauth::flow::ClientCredentials;
use crate::oauth::pkce::PkceVerifier;

const ACCESS_LEVEL_HEADER: &str = "x-access-level";

/// Grant-specific parameters of a token request.
pub(crate) enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
        code_verifier: Option<&'a PkceVerifier>,
    },
    RefreshToken {
        refresh_token: &'a SecretString,
    },
}

impl Grant<'_> {
    fn name(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }
}

/// Build the form body for a token request.
///
/// `client_id` is only sent by public clients; confidential clients are
/// identified by the Basic credential header instead.
pub(crate) fn token_request_form(
    grant: &Grant<'_>,
    credentials: &ClientCredentials,
) -> Vec<(&'static str, String)> {
    let mut form = vec![("grant_type", grant.name().to_string())];

    match grant {
        Grant::AuthorizationCode {
            code,
            redirect_uri,
            code_verifier,
        } => {
            form.push(("code", code.to_string()));
            form.push(("redirect_uri", redirect_uri.to_string()));
            if let ClientCredentials::Public { client_id } = credentials {
                form.push(("client_id", client_id.clone()));
            }
            if let Some(verifier) = code_verifier {
                form.push(("code_verifier", verifier.as_str().to_string()));
            }
        }
        Grant::RefreshToken { refresh_token } => {
            form.push(("refresh_token", refresh_token.expose_secret().to_string()));
            if let ClientCredentials::Public { client_id } = credentials {
                form.push(("client_id", client_id.clone()));
            }
        }
    }

    form
}

/// Client for the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    client: reqwest::Client,
    token_url: String,
}

impl TokenEndpoint {
    /// Create a token endpoint client with a bounded request timeout.
    pub fn new(token_url: impl Into<String>, http: &HttpClientConfig) -> Result<Self, Error> {
        Ok(Self {
            client: http.build_client()?,
            token_url: token_url.into(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// Required inputs for the client's mode are validated before any request is
    /// sent. The verifier is taken by value: it is single use.
    pub async fn exchange(
        &self,
        code: &str,
        code_verifier: Option<PkceVerifier>,
        redirect_uri: &str,
        credentials: &ClientCredentials,
    ) -> Result<TokenPair, Error> {
        let code = code.trim();
        if code.is_empty() {
            return Err(configuration_error(
                ConfigurationErrorKind::MissingParameter,
                "authorization code is required",
            ));
        }
        if redirect_uri.trim().is_empty() {
            return Err(configuration_error(
                ConfigurationErrorKind::MissingParameter,
                "redirect_uri is required for the code exchange",
            ));
        }
        if matches!(credentials, ClientCredentials::Public { .. }) && code_verifier.is_none() {
            return Err(configuration_error(
                ConfigurationErrorKind::MissingParameter,
                "code_verifier is required for the pkce flow; run the authorize step first",
            ));
        }

        debug!(
            "Exchanging authorization code ({} client)",
            credentials.mode()
        );

        let grant = Grant::AuthorizationCode {
            code,
            redirect_uri: redirect_uri.trim(),
            code_verifier: code_verifier.as_ref(),
        };
        let tokens = self.request(&grant, credentials).await?;

        info!("Exchanged authorization code for tokens");
        Ok(tokens)
    }

    /// Perform one refresh-token grant. Never retried.
    pub async fn refresh(
        &self,
        refresh_token: &SecretString,
        credentials: &ClientCredentials,
    ) -> Result<TokenPair, Error> {
        debug!("Refreshing access token ({} client)", credentials.mode());

        let grant = Grant::RefreshToken { refresh_token };
        let tokens = self.request(&grant, credentials).await?;

        info!("Refreshed access token");
        Ok(tokens)
    }

    async fn request(
        &self,
        grant: &Grant<'_>,
        credentials: &ClientCredentials,
    ) -> Result<TokenPair, Error> {
        let form = token_request_form(grant, credentials);

        let mut request = self.client.post(&self.token_url).form(&form);
        if let ClientCredentials::Confidential {
            client_id,
            client_secret,
        } = credentials
        {
            request = request.basic_auth(client_id, Some(client_secret.expose_secret()));
        }

        let response = request.send().await.map_err(|e| {
            warn!("Token endpoint request failed ({}): {:?}", grant.name(), e);
            Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Network),
            }
        })?;

        let status = response.status();
        let access_level = access_level(response.headers());
        let body = response.text().await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Network),
        })?;

        if !status.is_success() {
            let details: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let description = details.description();
            warn!(
                "Token endpoint rejected {} grant: status={} error={:?} description={:?} x-access-level={:?}",
                grant.name(),
                status.as_u16(),
                details.error,
                description,
                access_level
            );
            return Err(token_endpoint_error(
                TokenEndpointErrorKind::Rejected {
                    status: status.as_u16(),
                    error: details.error,
                    description,
                    access_level,
                },
                &format!("{} grant rejected", grant.name()),
            ));
        }

        let response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to parse token endpoint response: {:?}", e);
            Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::TokenEndpoint(TokenEndpointErrorKind::InvalidResponse),
            }
        })?;

        if response.access_token.trim().is_empty() {
            return Err(token_endpoint_error(
                TokenEndpointErrorKind::InvalidResponse,
                "token endpoint response has an empty access_token",
            ));
        }

        Ok(response.into_token_pair())
    }
}

fn access_level(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCESS_LEVEL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use mockito::Matcher;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    fn public() -> ClientCredentials {
        ClientCredentials::Public {
            client_id: "client-123".to_string(),
        }
    }

    fn confidential() -> ClientCredentials {
        ClientCredentials::Confidential {
            client_id: "client-123".to_string(),
            client_secret: SecretString::from("s3cret".to_string()),
        }
    }

    fn keys(form: &[(&'static str, String)]) -> Vec<&'static str> {
        form.iter().map(|(key, _)| *key).collect()
    }

    fn endpoint(server: &mockito::ServerGuard) -> TokenEndpoint {
        TokenEndpoint::new(
            format!("{}/2/oauth2/token", server.url()),
            &HttpClientConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_code_form_public_includes_client_id_and_verifier() {
        let verifier = PkceVerifier::parse(VERIFIER).unwrap();
        let grant = Grant::AuthorizationCode {
            code: "code",
            redirect_uri: "https://example.com/cb",
            code_verifier: Some(&verifier),
        };
        let form = token_request_form(&grant, &public());
        assert_eq!(
            keys(&form),
            vec!["grant_type", "code", "redirect_uri", "client_id", "code_verifier"]
        );
    }

    #[test]
    fn test_code_form_confidential_omits_client_id() {
        let verifier = PkceVerifier::parse(VERIFIER).unwrap();
        let with_verifier = Grant::AuthorizationCode {
            code: "code",
            redirect_uri: "https://example.com/cb",
            code_verifier: Some(&verifier),
        };
        assert_eq!(
            keys(&token_request_form(&with_verifier, &confidential())),
            vec!["grant_type", "code", "redirect_uri", "code_verifier"]
        );

        let without_verifier = Grant::AuthorizationCode {
            code: "code",
            redirect_uri: "https://example.com/cb",
            code_verifier: None,
        };
        assert_eq!(
            keys(&token_request_form(&without_verifier, &confidential())),
            vec!["grant_type", "code", "redirect_uri"]
        );
    }

    #[test]
    fn test_refresh_form_by_mode() {
        let refresh_token = SecretString::from("R1".to_string());
        let grant = Grant::RefreshToken {
            refresh_token: &refresh_token,
        };

        assert_eq!(
            keys(&token_request_form(&grant, &public())),
            vec!["grant_type", "refresh_token", "client_id"]
        );
        assert_eq!(
            keys(&token_request_form(&grant, &confidential())),
            vec!["grant_type", "refresh_token"]
        );
    }

    #[tokio::test]
    async fn test_exchange_public_sends_no_authorization_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2/oauth2/token")
            .match_header("authorization", Matcher::Missing)
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "https://example.com/cb".into()),
                Matcher::UrlEncoded("client_id".into(), "client-123".into()),
                Matcher::UrlEncoded("code_verifier".into(), VERIFIER.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"A1","refresh_token":"R1","expires_in":7200,"token_type":"bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let tokens = endpoint(&server)
            .exchange(
                "auth-code",
                Some(PkceVerifier::parse(VERIFIER).unwrap()),
                "https://example.com/cb",
                &public(),
            )
            .await
            .unwrap();

        assert_eq!(tokens.access_token.expose_secret(), "A1");
        assert_eq!(tokens.refresh_token.unwrap().expose_secret(), "R1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_confidential_sends_basic_credentials() {
        let mut server = mockito::Server::new_async().await;
        let expected = format!("Basic {}", STANDARD.encode("client-123:s3cret"));
        let mock = server
            .mock("POST", "/2/oauth2/token")
            .match_header("authorization", expected.as_str())
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
                Matcher::UrlEncoded("code_verifier".into(), VERIFIER.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"A1"}"#)
            .expect(1)
            .create_async()
            .await;

        let tokens = endpoint(&server)
            .exchange(
                "auth-code",
                Some(PkceVerifier::parse(VERIFIER).unwrap()),
                "https://example.com/cb",
                &confidential(),
            )
            .await
            .unwrap();

        assert_eq!(tokens.access_token.expose_secret(), "A1");
        assert!(tokens.refresh_token.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_public_without_verifier_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2/oauth2/token")
            .expect(0)
            .create_async()
            .await;

        let err = endpoint(&server)
            .exchange("auth-code", None, "https://example.com/cb", &public())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Configuration(ConfigurationErrorKind::MissingParameter)
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_requires_code_and_redirect_uri() {
        let server = mockito::Server::new_async().await;
        let endpoint = endpoint(&server);

        let err = endpoint
            .exchange(" ", None, "https://example.com/cb", &confidential())
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Configuration(ConfigurationErrorKind::MissingParameter)
        );

        let err = endpoint
            .exchange("code", None, "", &confidential())
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Configuration(ConfigurationErrorKind::MissingParameter)
        );
    }

    #[tokio::test]
    async fn test_rejection_carries_provider_error_and_access_level() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(400)
            .with_header("x-access-level", "read")
            .with_body(r#"{"error":"invalid_request","error_description":"Value passed for the authorization code was invalid."}"#)
            .create_async()
            .await;

        let err = endpoint(&server)
            .exchange("stale", None, "https://example.com/cb", &confidential())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Rejected {
                status: 400,
                error: Some("invalid_request".to_string()),
                description: Some(
                    "Value passed for the authorization code was invalid.".to_string()
                ),
                access_level: Some("read".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_non_json_rejection_still_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let refresh_token = SecretString::from("R1".to_string());
        let err = endpoint(&server)
            .refresh(&refresh_token, &public())
            .await
            .unwrap_err();

        assert!(matches!(
            err.error_kind,
            ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Rejected { status: 503, error: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2/oauth2/token")
            .with_status(200)
            .with_body(r#"{"token_type":"bearer"}"#)
            .create_async()
            .await;

        let refresh_token = SecretString::from("R1".to_string());
        let err = endpoint(&server)
            .refresh(&refresh_token, &public())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::TokenEndpoint(TokenEndpointErrorKind::InvalidResponse)
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let endpoint = TokenEndpoint::new(
            "http://127.0.0.1:9/2/oauth2/token",
            &HttpClientConfig::with_timeout(std::time::Duration::from_secs(2)),
        )
        .unwrap();

        let refresh_token = SecretString::from("R1".to_string());
        let err = endpoint.refresh(&refresh_token, &public()).await.unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::TokenEndpoint(TokenEndpointErrorKind::Network)
        );
    }
}
