//! GitHub App Installation Token Generator
//!
//! Prints a short-lived installation access token for a GitHub App, reusing a
//! cached token until it is within five minutes of expiry.
//!
//! ## Usage
//! ```bash
//! # With command line arguments
//! get-token \
//!   --app-id 123456 \
//!   --private-key-path ./key.pem \
//!   --installation-id 98765
//!
//! # With environment variables
//! GITHUB_APP_ID=123456 \
//! GITHUB_PRIVATE_KEY_BASE64="$(base64 -w0 key.pem)" \
//! GITHUB_INSTALLATION_ID=98765 \
//! get-token --json
//!
//! # Token substitution that falls back to existing auth when unconfigured
//! GH_TOKEN="$(get-token --fallback)" || exit 1
//! ```

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use github_token_broker::cache::write_private_file;
use github_token_broker::telemetry::init_tracing;
use github_token_broker::{BrokerArgs, Resolution, TokenOutput};
use std::path::PathBuf;
use tracing::info;

/// GitHub App Installation Token Generator
#[derive(Parser, Debug)]
#[command(name = "get-token")]
#[command(about = "Generate GitHub App installation access tokens")]
#[command(version)]
struct Args {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Print token, expiry, permissions and repositories as JSON
    #[arg(long)]
    json: bool,

    /// Print nothing and exit successfully when the GitHub App is not configured
    #[arg(long)]
    fallback: bool,

    /// Write the token to this file (mode 0600) instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let broker = args.broker.broker()?;
    let resolution = broker
        .resolve(args.broker.identity.resolve(), args.broker.force_refresh)
        .await
        .context("Failed to obtain installation token")?;

    let token = match resolution {
        Resolution::Token(token) => token,
        Resolution::NotConfigured(_) if args.fallback => return Ok(()),
        Resolution::NotConfigured(reason) => Args::command()
            .error(ErrorKind::MissingRequiredArgument, reason)
            .exit(),
    };

    let output = if args.json {
        serde_json::to_string_pretty(&TokenOutput::from(&token))?
    } else {
        token.token.clone()
    };

    if let Some(output_path) = args.output {
        write_private_file(&output_path, format!("{}\n", output).as_bytes())
            .with_context(|| format!("Failed to write token to {}", output_path.display()))?;
        info!(path = %output_path.display(), expires_at = %token.expires_at, "Token saved");
    } else {
        println!("{}", output);
    }

    Ok(())
}
