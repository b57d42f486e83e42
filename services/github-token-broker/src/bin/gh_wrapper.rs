//! gh wrapper
//!
//! Runs `gh` (or `--wrapped-bin`) with `GH_TOKEN` and `GITHUB_TOKEN` set to a
//! GitHub App installation token. Without GitHub App configuration the wrapped
//! binary runs with its environment untouched, so a previously configured
//! personal token keeps working.
//!
//! ```bash
//! alias gh=gh-app-wrapper
//! gh pr list --repo lornu-ai/lornu.ai
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use github_token_broker::credential::web_host;
use github_token_broker::telemetry::init_tracing;
use github_token_broker::{BrokerArgs, Resolution};
use tokio::process::Command;
use tracing::debug;

/// Run gh with a GitHub App installation token
#[derive(Parser, Debug)]
#[command(name = "gh-app-wrapper")]
#[command(about = "Run gh with a GitHub App installation token, falling back to existing auth")]
struct Args {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Binary to run with the token in its environment
    #[arg(long, env = "GH_APP_WRAPPED_BIN", default_value = "gh")]
    wrapped_bin: String,

    /// Arguments passed through to the wrapped binary
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let broker = args.broker.broker()?;
    let config = args.broker.identity.resolve();
    let api_base_url = config.as_ref().ok().map(|c| c.identity.api_base_url.clone());

    let mut command = Command::new(&args.wrapped_bin);
    command.args(&args.args);

    match broker
        .resolve(config, args.broker.force_refresh)
        .await
        .context("Failed to obtain installation token")?
    {
        Resolution::Token(token) => {
            command
                .env("GH_TOKEN", &token.token)
                .env("GITHUB_TOKEN", &token.token);
            let enterprise = api_base_url
                .as_deref()
                .and_then(web_host)
                .is_some_and(|host| host != "github.com");
            if enterprise {
                command.env("GH_ENTERPRISE_TOKEN", &token.token);
            }
        }
        Resolution::NotConfigured(reason) => {
            debug!(reason = %reason, "GitHub App not configured, running with existing credentials")
        }
    }

    let status = command
        .status()
        .await
        .with_context(|| format!("Failed to run {}", args.wrapped_bin))?;

    std::process::exit(status.code().unwrap_or(1));
}
