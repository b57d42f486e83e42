//! git credential helper protocol
//!
//! git writes `key=value` lines to the helper's stdin, terminated by a blank
//! line or EOF, and reads the same format back. Installation tokens are
//! presented as HTTPS basic auth with a fixed username.

use crate::token::InstallationToken;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

/// Username GitHub expects alongside an installation token
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Attributes git sent for a credential lookup
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    attributes: BTreeMap<String, String>,
}

impl CredentialRequest {
    /// Read attributes until a blank line or EOF; malformed lines are skipped
    pub fn read_from(reader: impl BufRead) -> io::Result<Self> {
        let mut attributes = BTreeMap::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once('=') {
                attributes.insert(key.to_string(), value.to_string());
            }
        }
        Ok(Self { attributes })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get("protocol")
    }

    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    /// Whether this request is for the GitHub host behind `api_base_url`
    ///
    /// Absent `protocol` or `host` attributes do not disqualify the request.
    pub fn is_for(&self, api_base_url: &str) -> bool {
        if self.protocol().is_some_and(|p| p != "https") {
            return false;
        }
        match (self.host(), web_host(api_base_url)) {
            (Some(host), Some(expected)) => host.eq_ignore_ascii_case(&expected),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Git host for an API base: `api.github.com` maps to `github.com`, any other
/// host (GitHub Enterprise Server) maps to itself; a non-default port is kept
pub fn web_host(api_base_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(api_base_url).ok()?;
    let host = url.host_str()?;
    let host = if host.eq_ignore_ascii_case("api.github.com") {
        "github.com"
    } else {
        host
    };
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Answer a `get` request with the token as the password
pub fn write_credentials(
    mut writer: impl Write,
    request: &CredentialRequest,
    token: &InstallationToken,
) -> io::Result<()> {
    if let Some(protocol) = request.protocol() {
        writeln!(writer, "protocol={protocol}")?;
    }
    if let Some(host) = request.host() {
        writeln!(writer, "host={host}")?;
    }
    writeln!(writer, "username={TOKEN_USERNAME}")?;
    writeln!(writer, "password={}", token.token)?;
    writeln!(
        writer,
        "password_expiry_utc={}",
        token.expires_at.timestamp()
    )?;
    writer.flush()
}
