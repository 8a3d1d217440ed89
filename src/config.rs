//! Environment-sourced process configuration
//!
//! Everything the proxy can be tuned with comes from environment variables;
//! there is no config file and no hardcoded credential fallback. Absent
//! credentials simply disable the auto-login path.

use std::path::PathBuf;

use crate::utils::constants::{AUTOLINK_API_PATH, DEFAULT_UPSTREAM_ORIGIN};

/// Identity-provider username/password pair.
///
/// Sourced from `IDP_USERNAME` / `IDP_PASSWORD`. Both must be present for
/// auto-login to be attempted at all.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`PORT`, default 3000).
    pub port: u16,

    /// Persistent Chrome profile directory (`CHROME_PROFILE_DIR`). When set,
    /// session cookies survive process restarts. When unset, an ephemeral
    /// per-process profile is used and cleaned up on shutdown.
    pub profile_dir: Option<PathBuf>,

    /// Browser executable override (`CHROME_PATH`). When unset the
    /// platform-specific discovery in `browser_setup` runs.
    pub chrome_path: Option<PathBuf>,

    /// Identity-provider credentials, if configured.
    pub credentials: Option<Credentials>,

    /// Run the browser with a visible window (`HEADFUL`). Diagnostic use only.
    pub headful: bool,

    /// Upstream site origin (`UPSTREAM_ORIGIN`).
    pub upstream_origin: String,
}

impl Config {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let credentials = match (
            std::env::var("IDP_USERNAME").ok().filter(|v| !v.is_empty()),
            std::env::var("IDP_PASSWORD").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        let upstream_origin = std::env::var("UPSTREAM_ORIGIN")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_UPSTREAM_ORIGIN.to_string());

        Self {
            port,
            profile_dir: std::env::var("CHROME_PROFILE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            chrome_path: std::env::var("CHROME_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            credentials,
            headful: matches!(
                std::env::var("HEADFUL").ok().as_deref(),
                Some("1") | Some("true") | Some("yes")
            ),
            upstream_origin,
        }
    }

    /// Full URL of the upstream autolink endpoint.
    pub fn autolink_api_url(&self) -> String {
        format!("{}{}", self.upstream_origin, AUTOLINK_API_PATH)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            profile_dir: None,
            chrome_path: None,
            credentials: None,
            headful: false,
            upstream_origin: DEFAULT_UPSTREAM_ORIGIN.to_string(),
        }
    }
}
