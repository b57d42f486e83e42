//! Installation token exchange
//!
//! A single `POST /app/installations/{id}/access_tokens` bearing the app JWT.
//! There are no retries here; a failed exchange is reported to the caller.

use crate::error::BrokerError;
use crate::token::InstallationToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "github-token-broker";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Exchanges an app JWT for an installation token
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        jwt: &str,
        installation_id: &str,
        api_base_url: &str,
    ) -> Result<InstallationToken, BrokerError>;
}

/// Response from GitHub's installation access token endpoint
#[derive(Debug, Deserialize)]
pub struct InstallationTokenResponse {
    pub token: String,
    pub expires_at: String,
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
    #[serde(default)]
    pub repositories: Option<Vec<RepositoryRef>>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryRef {
    pub full_name: String,
}

impl InstallationTokenResponse {
    /// Parse a response body into a token with an absolute expiry
    pub fn parse(body: &str) -> Result<InstallationToken, BrokerError> {
        let response: InstallationTokenResponse = serde_json::from_str(body)
            .map_err(|e| BrokerError::InvalidResponse(format!("malformed JSON body: {e}")))?;

        if response.token.is_empty() {
            return Err(BrokerError::InvalidResponse(
                "response contains an empty token".to_string(),
            ));
        }

        let expires_at = DateTime::parse_from_rfc3339(&response.expires_at)
            .map_err(|e| {
                BrokerError::InvalidResponse(format!(
                    "unparseable expires_at '{}': {}",
                    response.expires_at, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(InstallationToken {
            token: response.token,
            expires_at,
            permissions: response.permissions,
            repositories: response
                .repositories
                .map(|repos| repos.into_iter().map(|r| r.full_name).collect()),
        })
    }
}

/// Token endpoint for an installation under `api_base_url`
pub fn access_tokens_url(api_base_url: &str, installation_id: &str) -> String {
    format!(
        "{}/app/installations/{}/access_tokens",
        api_base_url.trim_end_matches('/'),
        installation_id
    )
}

/// Exchanger talking to the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubExchanger {
    client: reqwest::Client,
}

impl GitHubExchanger {
    /// Create an exchanger whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, BrokerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenExchanger for GitHubExchanger {
    async fn exchange(
        &self,
        jwt: &str,
        installation_id: &str,
        api_base_url: &str,
    ) -> Result<InstallationToken, BrokerError> {
        let url = access_tokens_url(api_base_url, installation_id);
        debug!(url = %url, installation_id = %installation_id, "Requesting installation token");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", jwt))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BrokerError::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        let token = InstallationTokenResponse::parse(&body)?;

        info!(
            installation_id = %installation_id,
            expires_at = %token.expires_at,
            permissions = token.permissions.len(),
            "Obtained installation token"
        );

        Ok(token)
    }
}
