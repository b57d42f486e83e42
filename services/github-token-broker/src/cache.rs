//! On-disk installation token cache
//!
//! One JSON document per (API host, app id, installation id) under the cache
//! directory.
//! Writes go to a temp file in the same directory and are renamed into place, so
//! a concurrent reader sees either the previous entry or the new one in full.
//! Anything wrong with a cached file is a cache miss, never an error.

use crate::config::Identity;
use crate::error::BrokerError;
use crate::token::CacheEntry;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A cached token is not reused once it is this close to expiry
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// File-backed token cache shared by concurrent invocations
#[derive(Debug, Clone)]
pub struct TokenCache {
    dir: PathBuf,
}

impl TokenCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache file for an identity
    pub fn path_for(&self, identity: &Identity) -> PathBuf {
        self.dir.join(format!(
            "installation-token-{}-{}-{}.json",
            sanitize(&api_host(&identity.api_base_url)),
            sanitize(&identity.app_id),
            sanitize(&identity.installation_id)
        ))
    }

    /// Load a still-usable entry for `identity`
    pub fn load(&self, identity: &Identity) -> Option<CacheEntry> {
        self.load_at(identity, Utc::now())
    }

    /// Load a still-usable entry for `identity` as of `now`
    ///
    /// Returns `None` when the file is missing, unreadable, malformed, written
    /// for another identity, or expires within [`EXPIRY_BUFFER_SECS`] of `now`.
    pub fn load_at(&self, identity: &Identity, now: DateTime<Utc>) -> Option<CacheEntry> {
        let path = self.path_for(identity);

        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %path.display(), "No cached token");
                return None;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cached token unreadable, ignoring");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cached token malformed, ignoring");
                return None;
            }
        };

        if entry.token.is_empty() {
            debug!(path = %path.display(), "Cached token is empty, ignoring");
            return None;
        }

        if !entry.matches(identity) {
            debug!(
                path = %path.display(),
                cached_app_id = %entry.app_id,
                cached_installation_id = %entry.installation_id,
                cached_api_base_url = %entry.api_base_url,
                "Cached token belongs to a different identity, ignoring"
            );
            return None;
        }

        let remaining = entry.expires_at - now;
        if remaining <= Duration::seconds(EXPIRY_BUFFER_SECS) {
            debug!(
                path = %path.display(),
                expires_at = %entry.expires_at,
                remaining_secs = remaining.num_seconds(),
                "Cached token too close to expiry"
            );
            return None;
        }

        debug!(path = %path.display(), expires_at = %entry.expires_at, "Using cached token");
        Some(entry)
    }

    /// Atomically replace the cache file for the entry's identity
    ///
    /// Creates the cache directory owner-only if needed, tightens an existing
    /// non-sticky directory to `0700`, and leaves the file at mode `0600` even
    /// if an older file had looser permissions.
    pub fn store(&self, entry: &CacheEntry) -> Result<PathBuf, BrokerError> {
        let identity = Identity {
            app_id: entry.app_id.clone(),
            installation_id: entry.installation_id.clone(),
            api_base_url: entry.api_base_url.clone(),
        };
        let path = self.path_for(&identity);

        create_private_dir(&self.dir).map_err(|source| BrokerError::CacheWrite {
            path: self.dir.clone(),
            source,
        })?;

        write_atomically(&path, entry).map_err(|source| BrokerError::CacheWrite {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), expires_at = %entry.expires_at, "Stored token in cache");
        Ok(path)
    }
}

fn write_atomically(path: &Path, entry: &CacheEntry) -> io::Result<()> {
    let mut data = serde_json::to_vec_pretty(entry)?;
    data.push(b'\n');
    write_private_file(path, &data)
}

/// Replace `path` with `contents`, readable and writable by the owner only
///
/// The bytes go to a `0600` temp file next to `path` which is then renamed over
/// it, so the contents are never visible under looser permissions and readers
/// never see a partial file.
pub fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".github-app-token-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    set_owner_only(tmp.path(), 0o600)?;
    tmp.as_file_mut().write_all(contents)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;
    set_owner_only(path, 0o600)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            let mode = meta.permissions().mode();
            // Sticky directories like /tmp are meant to be shared
            if mode & 0o077 != 0 && mode & 0o1000 == 0 {
                if let Err(e) = set_owner_only(dir, 0o700) {
                    debug!(path = %dir.display(), error = %e, "Could not tighten cache directory permissions");
                }
            }
            Ok(())
        }
        _ => fs::DirBuilder::new().recursive(true).mode(0o700).create(dir),
    }
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_owner_only(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Host (and explicit port) of the API base, falling back to the raw string
fn api_host(api_base_url: &str) -> String {
    match reqwest::Url::parse(api_base_url) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}_{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => api_base_url.to_string(),
        },
        Err(_) => api_base_url.to_string(),
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
