//! GitHub App Authentication
//!
//! Builds the short-lived RS256 JWT that authenticates as the GitHub App itself.
//! The JWT is only ever exchanged for an installation token; it is never cached.

use crate::config::PrivateKey;
use crate::error::BrokerError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Deserialize, Serialize};

/// Seconds `iat` is backdated to tolerate clock drift with GitHub
pub const CLOCK_SKEW_SECS: i64 = 60;

/// Lifetime of the JWT in seconds (GitHub's maximum)
pub const JWT_LIFETIME_SECS: i64 = 600;

/// JWT claims for GitHub App authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct GitHubAppClaims {
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer (GitHub App ID)
    pub iss: String,
}

impl GitHubAppClaims {
    /// Claims for `app_id` as of `now`
    pub fn new(app_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            iat: now.timestamp() - CLOCK_SKEW_SECS,
            exp: now.timestamp() + JWT_LIFETIME_SECS,
            iss: app_id.to_string(),
        }
    }
}

/// Generate a JWT for GitHub App authentication
///
/// # Arguments
/// * `app_id` - The GitHub App ID
/// * `private_key` - The app's RSA private key
/// * `now` - Current time; `iat` is backdated by [`CLOCK_SKEW_SECS`]
///
/// # Returns
/// A compact JWS (`header.payload.signature`) valid for 10 minutes
pub fn generate_jwt(
    app_id: &str,
    private_key: &PrivateKey,
    now: DateTime<Utc>,
) -> Result<String, BrokerError> {
    if app_id.trim().is_empty() {
        return Err(BrokerError::Configuration(
            "GitHub App ID must not be empty".to_string(),
        ));
    }

    let encoding_key = private_key.encoding_key()?;
    let claims = GitHubAppClaims::new(app_id, now);
    let header = Header::new(Algorithm::RS256);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| BrokerError::InvalidKey(format!("failed to sign JWT: {e}")))
}
