//! Identity configuration
//!
//! Every binary flattens [`BrokerArgs`] into its own clap parser so that the
//! flags and environment variables are identical across `get-token`, the git
//! credential helper, and the `gh` wrapper.

use crate::broker::TokenBroker;
use crate::cache::TokenCache;
use crate::error::BrokerError;
use crate::exchange::GitHubExchanger;
use base64::Engine;
use clap::Args;
use jsonwebtoken::EncodingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Public GitHub API base URL
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default timeout for the token exchange request
pub const DEFAULT_TIMEOUT_SECS: u64 = 8;

pub const ENV_APP_ID: &str = "GITHUB_APP_ID";
pub const ENV_INSTALLATION_ID: &str = "GITHUB_INSTALLATION_ID";
pub const ENV_PRIVATE_KEY_PATH: &str = "GITHUB_PRIVATE_KEY_PATH";
pub const ENV_PRIVATE_KEY_BASE64: &str = "GITHUB_PRIVATE_KEY_BASE64";
pub const ENV_API_URL: &str = "GITHUB_API_URL";
pub const ENV_CACHE_DIR: &str = "GITHUB_APP_TOKEN_CACHE_DIR";
pub const ENV_TIMEOUT_SECS: &str = "GITHUB_APP_TOKEN_TIMEOUT_SECS";

const CACHE_DIR_NAME: &str = "github-app-token";

/// The non-secret identity triple a cached token is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// GitHub App ID
    pub app_id: String,
    /// Installation ID the token is scoped to
    pub installation_id: String,
    /// API base URL, without a trailing slash
    pub api_base_url: String,
}

/// PEM-encoded RSA private key of the GitHub App
///
/// The key material never shows up in `Debug` output.
#[derive(Clone)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Wrap PEM bytes, checking that they parse as an RSA key
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Result<Self, BrokerError> {
        let key = Self(pem.into());
        key.encoding_key()?;
        Ok(key)
    }

    /// Read a PEM file from disk
    pub fn from_file(path: &Path) -> Result<Self, BrokerError> {
        let pem = std::fs::read(path).map_err(|e| {
            BrokerError::InvalidKey(format!(
                "failed to read private key file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_pem(pem)
    }

    /// Decode a base64-encoded PEM; embedded whitespace and newlines are ignored
    pub fn from_base64(encoded: &str) -> Result<Self, BrokerError> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let pem = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| BrokerError::InvalidKey(format!("private key is not valid base64: {e}")))?;
        Self::from_pem(pem)
    }

    /// Signing key for RS256
    pub fn encoding_key(&self) -> Result<EncodingKey, BrokerError> {
        EncodingKey::from_rsa_pem(&self.0)
            .map_err(|e| BrokerError::InvalidKey(format!("failed to parse RSA PEM: {e}")))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Everything needed to obtain an installation token
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub identity: Identity,
    pub private_key: PrivateKey,
}

impl IdentityConfig {
    /// Build a config, validating the ids and normalising the API URL
    pub fn new(
        app_id: impl Into<String>,
        installation_id: impl Into<String>,
        private_key: PrivateKey,
        api_base_url: &str,
    ) -> Result<Self, BrokerError> {
        let app_id = app_id.into().trim().to_string();
        let installation_id = installation_id.into().trim().to_string();
        if app_id.is_empty() {
            return Err(BrokerError::missing(&[ENV_APP_ID]));
        }
        if installation_id.is_empty() {
            return Err(BrokerError::missing(&[ENV_INSTALLATION_ID]));
        }

        Ok(Self {
            identity: Identity {
                app_id,
                installation_id,
                api_base_url: normalize_api_url(api_base_url)?,
            },
            private_key,
        })
    }
}

/// Trim whitespace and trailing slashes, and require an http(s) URL
pub fn normalize_api_url(raw: &str) -> Result<String, BrokerError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = if trimmed.is_empty() {
        DEFAULT_API_URL
    } else {
        trimmed
    };

    let url = reqwest::Url::parse(trimmed).map_err(|e| {
        BrokerError::Configuration(format!("invalid {ENV_API_URL} '{trimmed}': {e}"))
    })?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(BrokerError::Configuration(format!(
            "{ENV_API_URL} must be an http(s) URL, got '{trimmed}'"
        )));
    }

    Ok(trimmed.to_string())
}

/// `$XDG_CACHE_HOME/github-app-token`, else `~/.cache/github-app-token`
pub fn default_cache_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join(CACHE_DIR_NAME));
    }
    home::home_dir().map(|home| home.join(".cache").join(CACHE_DIR_NAME))
}

/// GitHub App identity flags, each backed by an environment variable
#[derive(Args, Debug, Clone, Default)]
pub struct IdentityArgs {
    /// GitHub App ID
    #[arg(long, env = ENV_APP_ID)]
    pub app_id: Option<String>,

    /// GitHub App Installation ID
    #[arg(long, env = ENV_INSTALLATION_ID)]
    pub installation_id: Option<String>,

    /// Path to the private key PEM file
    #[arg(long, env = ENV_PRIVATE_KEY_PATH)]
    pub private_key_path: Option<PathBuf>,

    /// Base64-encoded private key PEM (alternative to --private-key-path)
    #[arg(long, env = ENV_PRIVATE_KEY_BASE64, hide_env_values = true)]
    pub private_key_base64: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    pub api_url: String,
}

enum KeySource<'a> {
    Path(&'a Path),
    Base64(&'a str),
}

impl IdentityArgs {
    /// Resolve into a validated config
    ///
    /// Absent or conflicting settings yield [`BrokerError::Configuration`]; a key
    /// that is present but unusable yields [`BrokerError::InvalidKey`].
    pub fn resolve(&self) -> Result<IdentityConfig, BrokerError> {
        let app_id = non_empty(&self.app_id);
        let installation_id = non_empty(&self.installation_id);
        let key_path = self
            .private_key_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty());
        let key_base64 = non_empty(&self.private_key_base64);

        let mut missing = Vec::new();
        if app_id.is_none() {
            missing.push(ENV_APP_ID);
        }
        if installation_id.is_none() {
            missing.push(ENV_INSTALLATION_ID);
        }
        let key_source = match (key_path, key_base64) {
            (Some(_), Some(_)) => {
                return Err(BrokerError::Configuration(format!(
                    "{ENV_PRIVATE_KEY_PATH} and {ENV_PRIVATE_KEY_BASE64} are mutually exclusive"
                )))
            }
            (Some(path), None) => Some(KeySource::Path(path)),
            (None, Some(encoded)) => Some(KeySource::Base64(encoded)),
            (None, None) => {
                missing.push("GITHUB_PRIVATE_KEY_PATH or GITHUB_PRIVATE_KEY_BASE64");
                None
            }
        };

        let (Some(app_id), Some(installation_id), Some(key_source)) =
            (app_id, installation_id, key_source)
        else {
            return Err(BrokerError::missing(&missing));
        };

        let api_base_url = normalize_api_url(&self.api_url)?;
        let private_key = match key_source {
            KeySource::Path(path) => PrivateKey::from_file(path)?,
            KeySource::Base64(encoded) => PrivateKey::from_base64(encoded)?,
        };

        debug!(app_id = %app_id, installation_id = %installation_id, api_base_url = %api_base_url, "Resolved GitHub App identity");
        IdentityConfig::new(app_id, installation_id, private_key, &api_base_url)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Identity flags plus cache and transport settings shared by every binary
#[derive(Args, Debug, Clone)]
pub struct BrokerArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Directory holding the token cache
    #[arg(long, env = ENV_CACHE_DIR)]
    pub cache_dir: Option<PathBuf>,

    /// Timeout in seconds for the token exchange request
    #[arg(long, env = ENV_TIMEOUT_SECS, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Skip the cache and always exchange for a fresh token
    #[arg(long)]
    pub force_refresh: bool,
}

impl BrokerArgs {
    /// Build a broker talking to GitHub, cached under the configured directory
    pub fn broker(&self) -> Result<TokenBroker<GitHubExchanger>, BrokerError> {
        let exchanger = GitHubExchanger::new(Duration::from_secs(self.timeout_secs))?;
        let broker = TokenBroker::new(exchanger);

        match self
            .cache_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .or_else(default_cache_dir)
        {
            Some(dir) => Ok(broker.with_cache(TokenCache::new(dir))),
            None => {
                debug!("No cache directory available, running without a token cache");
                Ok(broker)
            }
        }
    }
}
