use clap::builder::TypedValueParser as _;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::LevelFilter;
use secrecy::SecretString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com";
pub const DEFAULT_SCOPE: &str = "tweet.write tweet.read users.read offline.access";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_SECRET_NAME: &str = "X_OAUTH2_REFRESH_TOKEN";

/// Explicit client authentication flow override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OAuthFlow {
    Pkce,
    Confidential,
}

#[derive(Debug, PartialEq, Eq)]
pub struct OAuthFlowParseError(String);

impl fmt::Display for OAuthFlowParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unknown OAuth flow '{}', expected 'pkce' or 'confidential'",
            self.0
        )
    }
}

impl std::error::Error for OAuthFlowParseError {}

impl FromStr for OAuthFlow {
    type Err = OAuthFlowParseError;
    fn from_str(flow: &str) -> Result<OAuthFlow, Self::Err> {
        match flow.trim().to_lowercase().as_str() {
            "pkce" | "public" => Ok(OAuthFlow::Pkce),
            "confidential" => Ok(OAuthFlow::Confidential),
            other => Err(OAuthFlowParseError(other.to_string())),
        }
    }
}

impl fmt::Display for OAuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OAuthFlow::Pkce => write!(f, "pkce"),
            OAuthFlow::Confidential => write!(f, "confidential"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Generate a PKCE pair, store it, and print the authorization URL to open.
    Authorize {
        /// Use this `state` value instead of a random one.
        #[arg(long)]
        state: Option<String>,
        /// Also print the code verifier.
        #[arg(long)]
        show_verifier: bool,
    },
    /// Exchange an authorization code and publish the resulting refresh token.
    Exchange {
        /// The `code` query parameter from the redirect.
        code: String,
        /// The `state` the authorization was started with. Defaults to the latest one.
        #[arg(long)]
        state: Option<String>,
    },
    /// Refresh the access token once and publish a rotated refresh token.
    Refresh,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Authorize { .. } => "authorize",
            Command::Exchange { .. } => "exchange",
            Command::Refresh => "refresh",
        }
    }
}

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// OAuth 2.0 client ID of the social platform app.
    #[arg(long, env)]
    x_client_id: Option<String>,

    /// OAuth 2.0 client secret. Its presence selects the confidential flow.
    #[arg(long, env, hide_env_values = true)]
    x_client_secret: Option<String>,

    /// Redirect URI registered for the app.
    #[arg(long, env)]
    x_redirect_uri: Option<String>,

    /// Force the client authentication flow instead of inferring it from the secret.
    #[arg(long, env,
        value_parser = clap::builder::PossibleValuesParser::new([
            "pkce", "public", "confidential", "PKCE", "PUBLIC", "CONFIDENTIAL"
        ])
            .try_map(|s| s.parse::<OAuthFlow>()),
    )]
    pub x_oauth2_flow: Option<OAuthFlow>,

    /// Code verifier for `exchange` when no pending authorization is stored.
    #[arg(long, env, hide_env_values = true)]
    x_code_verifier: Option<String>,

    /// The refresh token stored by the previous run.
    #[arg(long, env, hide_env_values = true)]
    x_oauth2_refresh_token: Option<String>,

    /// Authorization endpoint the user is sent to for consent.
    #[arg(long, env, default_value = DEFAULT_AUTHORIZE_URL)]
    x_authorize_url: String,

    /// Token endpoint for code exchange and refresh.
    #[arg(long, env, default_value = DEFAULT_TOKEN_URL)]
    x_token_url: String,

    /// Base URL of the social platform API used for posting.
    #[arg(long, env, default_value = DEFAULT_API_BASE_URL)]
    x_api_base_url: String,

    /// Space separated scopes requested during authorization.
    #[arg(long, env, default_value = DEFAULT_SCOPE)]
    x_oauth2_scope: String,

    /// Base URL of the repository secrets API.
    /// Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,

    /// Token allowed to write repository secrets.
    #[arg(long, env, hide_env_values = true)]
    github_token: Option<String>,

    /// `owner/repo` holding the refresh token secret.
    #[arg(long, env)]
    github_repository: Option<String>,

    /// Name of the repository secret holding the refresh token.
    #[arg(long, env, default_value = DEFAULT_SECRET_NAME)]
    refresh_token_secret_name: String,

    /// Log rotated tokens instead of writing them to the secret store.
    #[arg(long, env)]
    pub rotation_dry_run: bool,

    /// Per-request timeout in seconds for every outbound HTTP call.
    #[arg(long, env, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub http_timeout_secs: u64,

    /// File holding pending authorizations between `authorize` and `exchange`.
    #[arg(long, env, default_value = ".pkce.json")]
    pkce_state_path: PathBuf,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .try_map(|s| s.parse::<LevelFilter>()),
        )]
    pub log_level_filter: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.x_client_id)
    }

    pub fn client_secret(&self) -> Option<SecretString> {
        non_empty(&self.x_client_secret).map(|s| SecretString::from(s.to_string()))
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        non_empty(&self.x_redirect_uri)
    }

    pub fn code_verifier(&self) -> Option<&str> {
        non_empty(&self.x_code_verifier)
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        non_empty(&self.x_oauth2_refresh_token).map(|s| SecretString::from(s.to_string()))
    }

    pub fn authorize_url(&self) -> &str {
        &self.x_authorize_url
    }

    pub fn token_url(&self) -> &str {
        &self.x_token_url
    }

    pub fn api_base_url(&self) -> &str {
        self.x_api_base_url.trim_end_matches('/')
    }

    pub fn scope(&self) -> &str {
        &self.x_oauth2_scope
    }

    pub fn github_api_url(&self) -> &str {
        &self.github_api_url
    }

    pub fn github_token(&self) -> Option<SecretString> {
        non_empty(&self.github_token).map(|s| SecretString::from(s.to_string()))
    }

    pub fn github_repository(&self) -> Option<&str> {
        non_empty(&self.github_repository)
    }

    /// Returns `(owner, repo)` when `GITHUB_REPOSITORY` is a well formed `owner/repo`.
    pub fn repository_parts(&self) -> Option<(&str, &str)> {
        let (owner, repo) = self.github_repository()?.split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some((owner, repo))
    }

    pub fn refresh_token_secret_name(&self) -> &str {
        &self.refresh_token_secret_name
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn pkce_state_path(&self) -> &Path {
        &self.pkce_state_path
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn redacted(value: &Option<String>) -> &'static str {
    match non_empty(value) {
        Some(_) => "[REDACTED]",
        None => "<unset>",
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("x_client_id", &self.x_client_id)
            .field("x_client_secret", &redacted(&self.x_client_secret))
            .field("x_redirect_uri", &self.x_redirect_uri)
            .field("x_oauth2_flow", &self.x_oauth2_flow)
            .field("x_code_verifier", &redacted(&self.x_code_verifier))
            .field(
                "x_oauth2_refresh_token",
                &redacted(&self.x_oauth2_refresh_token),
            )
            .field("x_authorize_url", &self.x_authorize_url)
            .field("x_token_url", &self.x_token_url)
            .field("x_api_base_url", &self.x_api_base_url)
            .field("x_oauth2_scope", &self.x_oauth2_scope)
            .field("github_api_url", &self.github_api_url)
            .field("github_token", &redacted(&self.github_token))
            .field("github_repository", &self.github_repository)
            .field("refresh_token_secret_name", &self.refresh_token_secret_name)
            .field("rotation_dry_run", &self.rotation_dry_run)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("pkce_state_path", &self.pkce_state_path)
            .field("log_level_filter", &self.log_level_filter)
            .field("command", &self.command.name())
            .finish()
    }
}
