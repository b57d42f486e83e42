//! Token broker facade
//!
//! Cache lookup, then JWT signing and exchange on a miss, then a best-effort
//! cache write. Every binary is a thin output adapter over [`TokenBroker`].

use crate::auth::generate_jwt;
use crate::cache::TokenCache;
use crate::config::IdentityConfig;
use crate::error::BrokerError;
use crate::exchange::{GitHubExchanger, TokenExchanger};
use crate::token::{CacheEntry, InstallationToken};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Result of a lookup where missing configuration is acceptable
#[derive(Debug)]
pub enum Resolution {
    /// A usable installation token
    Token(InstallationToken),
    /// No (or incomplete) GitHub App configuration; the caller should fall back
    NotConfigured(String),
}

/// Obtains installation tokens, reusing cached ones while they are fresh
#[derive(Debug)]
pub struct TokenBroker<E = GitHubExchanger> {
    exchanger: E,
    cache: Option<TokenCache>,
}

impl<E: TokenExchanger> TokenBroker<E> {
    /// Create a broker without a cache
    pub fn new(exchanger: E) -> Self {
        Self {
            exchanger,
            cache: None,
        }
    }

    /// Attach an on-disk cache
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&TokenCache> {
        self.cache.as_ref()
    }

    /// Get an installation token for `config`
    ///
    /// With `force_refresh` the cache is not consulted, but the fresh token is
    /// still written to it.
    pub async fn get_token(
        &self,
        config: &IdentityConfig,
        force_refresh: bool,
    ) -> Result<InstallationToken, BrokerError> {
        let identity = &config.identity;

        if !force_refresh {
            if let Some(entry) = self.cache.as_ref().and_then(|c| c.load(identity)) {
                debug!(
                    app_id = %identity.app_id,
                    installation_id = %identity.installation_id,
                    expires_at = %entry.expires_at,
                    "Cache hit"
                );
                return Ok(entry.into_token());
            }
        }

        info!(
            app_id = %identity.app_id,
            installation_id = %identity.installation_id,
            force_refresh,
            "Exchanging GitHub App JWT for installation token"
        );

        let jwt = generate_jwt(&identity.app_id, &config.private_key, Utc::now())?;
        let token = self
            .exchanger
            .exchange(&jwt, &identity.installation_id, &identity.api_base_url)
            .await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&CacheEntry::new(identity, &token)) {
                warn!(error = %e, "Failed to cache installation token, continuing without cache");
            }
        }

        Ok(token)
    }

    /// Like [`get_token`](Self::get_token), but a configuration error means
    /// "not applicable" instead of failure
    ///
    /// Nothing is signed or sent when the configuration is incomplete. Invalid
    /// keys, network and authentication failures are still errors.
    pub async fn resolve(
        &self,
        config: Result<IdentityConfig, BrokerError>,
        force_refresh: bool,
    ) -> Result<Resolution, BrokerError> {
        match config {
            Ok(config) => Ok(Resolution::Token(
                self.get_token(&config, force_refresh).await?,
            )),
            Err(BrokerError::Configuration(reason)) => {
                debug!(reason = %reason, "GitHub App not configured, falling back");
                Ok(Resolution::NotConfigured(reason))
            }
            Err(e) => Err(e),
        }
    }
}
