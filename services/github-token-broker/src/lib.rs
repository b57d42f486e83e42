//! GitHub App Installation Token Broker
//!
//! Exchanges a GitHub App private key for a short-lived installation token,
//! caches it on disk across invocations, and hands it to git and `gh`.
//!
//! ## Binaries
//!
//! - `get-token`: Print an installation token (plain or `--json`)
//! - `git-credential-github-app`: git credential helper backed by the broker
//! - `gh-app-wrapper`: Run `gh` with `GH_TOKEN` set from the broker
//!
//! ## Usage
//!
//! ```bash
//! export GITHUB_APP_ID=123456
//! export GITHUB_INSTALLATION_ID=98765
//! export GITHUB_PRIVATE_KEY_PATH=/secrets/app.pem
//!
//! # Raw token, cached until 5 minutes before expiry
//! TOKEN=$(get-token)
//!
//! # git over HTTPS
//! git config --global credential.https://github.com.helper github-app
//!
//! # gh, falling back to its own auth when the app is not configured
//! alias gh=gh-app-wrapper
//! ```
//!
//! ## Library
//!
//! ```ignore
//! use github_token_broker::{GitHubExchanger, IdentityConfig, PrivateKey, TokenBroker, TokenCache};
//!
//! let key = PrivateKey::from_file("app.pem".as_ref())?;
//! let config = IdentityConfig::new("123456", "98765", key, "https://api.github.com")?;
//! let broker = TokenBroker::new(GitHubExchanger::new(std::time::Duration::from_secs(8))?)
//!     .with_cache(TokenCache::new("/home/me/.cache/github-app-token"));
//! let token = broker.get_token(&config, false).await?;
//! ```

pub mod auth;
pub mod broker;
pub mod cache;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod telemetry;
pub mod token;

pub use broker::{Resolution, TokenBroker};
pub use cache::TokenCache;
pub use config::{BrokerArgs, Identity, IdentityArgs, IdentityConfig, PrivateKey};
pub use error::BrokerError;
pub use exchange::{GitHubExchanger, TokenExchanger};
pub use token::{CacheEntry, InstallationToken, TokenOutput};
