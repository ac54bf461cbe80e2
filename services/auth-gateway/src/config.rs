//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The signing secret and the identity-provider client secret come from env
//! vars or secret files, never from the TOML directly. A missing signing
//! secret is fatal: the gateway refuses to start.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use credential::CredentialConfig;
use identity_provider::OidcEndpoints;
use identity_provider::constants::{
    GOOGLE_AUTHORIZE_ENDPOINT, GOOGLE_TOKEN_ENDPOINT, GOOGLE_USERINFO_ENDPOINT,
};
use serde::Deserialize;
use stores::TrustedIdentity;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub identity_provider: IdentityProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Trust set seed entries
    #[serde(default)]
    pub identities: Vec<TrustedIdentity>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Upper bound on authorization-code flows awaiting their callback
    #[serde(default = "default_max_pending_logins")]
    pub max_pending_logins: usize,
}

/// Credential signing settings
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_access_minutes")]
    pub access_token_expire_minutes: u64,
    #[serde(default = "default_refresh_minutes")]
    pub refresh_token_expire_minutes: u64,
    /// Path to a file containing the signing secret (alternative to API_SECRET_KEY)
    #[serde(default)]
    pub secret_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
}

/// OpenID Connect client settings
#[derive(Debug, Deserialize)]
pub struct IdentityProviderConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    /// Path to a file containing the client secret (alternative to GOOGLE_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_userinfo_endpoint")]
    pub userinfo_endpoint: String,
}

/// Store locations
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_revocation_path")]
    pub revocation_path: PathBuf,
    /// Optional JSON seed file: `{"email": {"name": "..."}}`
    #[serde(default)]
    pub identities_path: Option<PathBuf>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7000))
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_pending_logins() -> usize {
    10_000
}

fn default_algorithm() -> String {
    "HS256".into()
}

fn default_access_minutes() -> u64 {
    15
}

fn default_refresh_minutes() -> u64 {
    60 * 24 * 30
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:7000/token".into()
}

fn default_authorize_endpoint() -> String {
    GOOGLE_AUTHORIZE_ENDPOINT.into()
}

fn default_token_endpoint() -> String {
    GOOGLE_TOKEN_ENDPOINT.into()
}

fn default_userinfo_endpoint() -> String {
    GOOGLE_USERINFO_ENDPOINT.into()
}

fn default_revocation_path() -> PathBuf {
    PathBuf::from("blacklist.json")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            max_pending_logins: default_max_pending_logins(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            access_token_expire_minutes: default_access_minutes(),
            refresh_token_expire_minutes: default_refresh_minutes(),
            secret_key_file: None,
            secret: None,
        }
    }
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret_file: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            userinfo_endpoint: default_userinfo_endpoint(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            revocation_path: default_revocation_path(),
            identities_path: None,
        }
    }
}

impl TokenConfig {
    pub fn access_ttl(&self) -> common::Result<Duration> {
        minutes_to_duration("access_token_expire_minutes", self.access_token_expire_minutes)
    }

    pub fn refresh_ttl(&self) -> common::Result<Duration> {
        minutes_to_duration("refresh_token_expire_minutes", self.refresh_token_expire_minutes)
    }
}

/// Convert a configured minute count, refusing zero and values that overflow seconds.
fn minutes_to_duration(name: &str, minutes: u64) -> common::Result<Duration> {
    if minutes == 0 {
        return Err(common::Error::Config(format!("{name} must be greater than 0")));
    }
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| common::Error::Config(format!("{name} is too large: {minutes}")))
}

impl Config {
    /// Load configuration from a TOML file, overlay environment variables, validate.
    ///
    /// Secret resolution order (each): env var, then the configured file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(algorithm) = std::env::var("API_ALGORITHM") {
            self.tokens.algorithm = algorithm;
        }
        if let Ok(minutes) = std::env::var("API_ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.tokens.access_token_expire_minutes = minutes.trim().parse().map_err(|_| {
                common::Error::Config(format!(
                    "API_ACCESS_TOKEN_EXPIRE_MINUTES must be a whole number of minutes, got: {minutes}"
                ))
            })?;
        }
        if let Ok(client_id) = std::env::var("GOOGLE_CLIENT_ID") {
            self.identity_provider.client_id = Some(client_id);
        }
        if let Ok(redirect_uri) = std::env::var("REDIRECT_URI") {
            self.identity_provider.redirect_uri = redirect_uri;
        }

        self.tokens.secret =
            resolve_secret("API_SECRET_KEY", self.tokens.secret_key_file.as_deref())?;
        self.identity_provider.client_secret = resolve_secret(
            "GOOGLE_CLIENT_SECRET",
            self.identity_provider.client_secret_file.as_deref(),
        )?;
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        if self.tokens.secret.is_none() {
            return Err(common::Error::MissingSecret("API_SECRET_KEY"));
        }

        credential::config::parse_algorithm(&self.tokens.algorithm)
            .map_err(|e| common::Error::Config(e.to_string()))?;

        self.tokens.access_ttl()?;
        self.tokens.refresh_ttl()?;
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.server.max_pending_logins == 0 {
            return Err(common::Error::Config(
                "max_pending_logins must be greater than 0".into(),
            ));
        }

        match self.identity_provider.client_id.as_deref() {
            Some(id) if !id.trim().is_empty() => {}
            _ => {
                return Err(common::Error::Config(
                    "identity provider client_id is required (GOOGLE_CLIENT_ID)".into(),
                ));
            }
        }
        if self.identity_provider.client_secret.is_none() {
            return Err(common::Error::MissingSecret("GOOGLE_CLIENT_SECRET"));
        }

        for (name, url) in [
            ("redirect_uri", &self.identity_provider.redirect_uri),
            ("authorize_endpoint", &self.identity_provider.authorize_endpoint),
            ("token_endpoint", &self.identity_provider.token_endpoint),
            ("userinfo_endpoint", &self.identity_provider.userinfo_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        Ok(())
    }

    /// Build the signing configuration handed to the credential engine.
    pub fn credential_config(&self) -> common::Result<CredentialConfig> {
        let secret = self
            .tokens
            .secret
            .clone()
            .ok_or(common::Error::MissingSecret("API_SECRET_KEY"))?;
        let algorithm = credential::config::parse_algorithm(&self.tokens.algorithm)
            .map_err(|e| common::Error::Config(e.to_string()))?;
        let access_ttl = self.tokens.access_ttl()?;
        let refresh_ttl = self.tokens.refresh_ttl()?;

        CredentialConfig::new(secret)
            .and_then(|c| c.with_algorithm(algorithm))
            .and_then(|c| c.with_access_ttl(access_ttl))
            .and_then(|c| c.with_refresh_ttl(refresh_ttl))
            .map_err(|e| common::Error::Config(e.to_string()))
    }

    pub fn oidc_endpoints(&self) -> OidcEndpoints {
        OidcEndpoints {
            authorize: self.identity_provider.authorize_endpoint.clone(),
            token: self.identity_provider.token_endpoint.clone(),
            userinfo: self.identity_provider.userinfo_endpoint.clone(),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-gateway.toml")
    }
}

/// Read a secret from `env_var`, falling back to `file`.
///
/// A file that exists but holds only whitespace yields no secret.
fn resolve_secret(env_var: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return Ok(Some(Secret::new(value)));
        }
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read secret file {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value)))
}
