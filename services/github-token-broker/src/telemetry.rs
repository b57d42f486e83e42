//! Logging setup
//!
//! Logs always go to stderr; stdout carries tokens and credential-helper
//! responses only.

use tracing_subscriber::EnvFilter;

/// Selects JSON log lines when set to `json`
pub const ENV_LOG_FORMAT: &str = "GITHUB_APP_TOKEN_LOG_FORMAT";

/// Install the global subscriber, filtered by `RUST_LOG` (default `warn`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when embedded in another binary
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
