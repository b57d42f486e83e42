//! git credential helper
//!
//! ```bash
//! git config --global credential.https://github.com.helper github-app
//! ```
//!
//! Answers `get` with `username=x-access-token` and the installation token as
//! the password. When the GitHub App is not configured, or git asks about a
//! different host, it prints nothing so git moves on to its next helper.

use anyhow::{Context, Result};
use clap::Parser;
use github_token_broker::config::normalize_api_url;
use github_token_broker::credential::{write_credentials, CredentialRequest};
use github_token_broker::telemetry::init_tracing;
use github_token_broker::{BrokerArgs, Resolution};
use std::io;
use tracing::debug;

/// git credential helper backed by GitHub App installation tokens
#[derive(Parser, Debug)]
#[command(name = "git-credential-github-app")]
#[command(about = "git credential helper that answers with GitHub App installation tokens")]
#[command(version)]
struct Args {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Action requested by git: get, store or erase
    action: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let request = CredentialRequest::read_from(io::stdin().lock())
        .context("Failed to read credential request from git")?;

    if args.action != "get" {
        debug!(action = %args.action, "Ignoring credential action");
        return Ok(());
    }

    // Other hosts are ruled out before the key is read
    if let Ok(api_base_url) = normalize_api_url(&args.broker.identity.api_url) {
        if !request.is_for(&api_base_url) {
            debug!(
                protocol = request.protocol().unwrap_or_default(),
                host = request.host().unwrap_or_default(),
                "Credential request is for another host"
            );
            return Ok(());
        }
    }

    let broker = args.broker.broker()?;
    match broker
        .resolve(args.broker.identity.resolve(), args.broker.force_refresh)
        .await
        .context("Failed to obtain installation token")?
    {
        Resolution::Token(token) => write_credentials(io::stdout().lock(), &request, &token)
            .context("Failed to write credentials to git")?,
        Resolution::NotConfigured(reason) => {
            debug!(reason = %reason, "GitHub App not configured, deferring to other helpers")
        }
    }

    Ok(())
}
