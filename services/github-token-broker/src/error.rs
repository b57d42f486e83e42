//! Broker error taxonomy
//!
//! Cache *read* problems never appear here: they are normalised to a cache miss
//! inside [`crate::cache::TokenCache::load`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while obtaining an installation token
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Required identity settings are absent or inconsistent
    #[error("GitHub App configuration error: {0}")]
    Configuration(String),

    /// The private key cannot be read, decoded, or used for signing
    #[error("Invalid GitHub App private key: {0}")]
    InvalidKey(String),

    /// Transport failure or timeout while talking to the GitHub API
    #[error("Network error contacting GitHub API: {0}")]
    Network(#[from] reqwest::Error),

    /// GitHub rejected the assertion or the installation
    #[error("GitHub API rejected token request ({status}): {body}")]
    Authentication {
        /// HTTP status returned by GitHub
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// GitHub answered 2xx with a body that is not a usable token document
    #[error("Invalid installation token response: {0}")]
    InvalidResponse(String),

    /// Persisting the token cache failed
    #[error("Failed to write token cache {}: {source}", path.display())]
    CacheWrite {
        /// Cache file or directory that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl BrokerError {
    /// Build a configuration error listing the missing settings
    pub fn missing(names: &[&str]) -> Self {
        BrokerError::Configuration(format!("missing {}", names.join(", ")))
    }
}
