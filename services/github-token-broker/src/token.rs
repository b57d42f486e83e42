//! Installation token types

use crate::config::Identity;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A usable installation access token
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationToken {
    /// Opaque bearer token (`ghs_...`)
    pub token: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
    /// Granted permissions, e.g. `contents -> read`
    pub permissions: BTreeMap<String, String>,
    /// Repository full names, when the installation is scoped to a selection
    pub repositories: Option<Vec<String>>,
}

impl fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("permissions", &self.permissions)
            .field("repositories", &self.repositories)
            .finish()
    }
}

/// On-disk cache document: the token plus the identity it was issued for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub token: String,
    /// Milliseconds since the Unix epoch
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
    pub app_id: String,
    pub installation_id: String,
    pub api_base_url: String,
}

impl CacheEntry {
    /// Bind a token to the identity that obtained it
    pub fn new(identity: &Identity, token: &InstallationToken) -> Self {
        Self {
            token: token.token.clone(),
            expires_at: token.expires_at,
            permissions: token.permissions.clone(),
            repositories: token.repositories.clone(),
            app_id: identity.app_id.clone(),
            installation_id: identity.installation_id.clone(),
            api_base_url: identity.api_base_url.clone(),
        }
    }

    /// Whether this entry was written for `identity`
    pub fn matches(&self, identity: &Identity) -> bool {
        self.app_id == identity.app_id
            && self.installation_id == identity.installation_id
            && self.api_base_url.trim_end_matches('/') == identity.api_base_url
    }

    pub fn into_token(self) -> InstallationToken {
        InstallationToken {
            token: self.token,
            expires_at: self.expires_at,
            permissions: self.permissions,
            repositories: self.repositories,
        }
    }
}

/// Structured output of `get-token --json`
#[derive(Debug, Serialize)]
pub struct TokenOutput {
    pub token: String,
    /// RFC 3339, UTC
    pub expires_at: String,
    pub permissions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
}

impl From<&InstallationToken> for TokenOutput {
    fn from(token: &InstallationToken) -> Self {
        Self {
            token: token.token.clone(),
            expires_at: token.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            permissions: token.permissions.clone(),
            repositories: token.repositories.clone(),
        }
    }
}
