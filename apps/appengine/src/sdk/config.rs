//! Pipeline configuration.
//!
//! The command layer resolves flags and environment variables once and hands
//! the result to the pipeline as an [`InstallConfig`]. Nothing below this
//! module reads process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Default update-check endpoint that reports the current SDK release.
pub const DEFAULT_UPDATECHECK_URL: &str = "https://appengine.google.com/api/updatecheck";

/// Directory name of the unpacked SDK inside the install prefix.
pub const SDK_DIR: &str = "google_appengine";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("appengine-sdk/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every HTTP request the pipeline makes.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Endpoint queried for the current release.
    pub updatecheck_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Value sent as the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            updatecheck_url: DEFAULT_UPDATECHECK_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    /// Builds a client honouring the timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .context("Failed to create HTTP client")
    }
}

/// Everything one install run needs.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Version, `latest`, URL or path. `None` means the current release.
    pub sdk: Option<String>,
    /// Directory the SDK is unpacked into.
    pub prefix: PathBuf,
    /// Directory receiving tool links; defaults to `<prefix>/bin`.
    pub bindir: Option<PathBuf>,
    /// Replace an existing SDK and existing tool links.
    pub force: bool,
    /// Skip publishing tools entirely.
    pub no_bindir: bool,
    /// HTTP settings for the catalog and archive downloads.
    pub http: HttpSettings,
}

impl InstallConfig {
    /// Creates a configuration installing the current release into `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            sdk: None,
            prefix: prefix.into(),
            bindir: None,
            force: false,
            no_bindir: false,
            http: HttpSettings::default(),
        }
    }

    /// The tools directory, or `None` when publishing is disabled.
    #[must_use]
    pub fn tools_dir(&self) -> Option<PathBuf> {
        if self.no_bindir {
            return None;
        }
        Some(
            self.bindir
                .clone()
                .unwrap_or_else(|| self.prefix.join("bin")),
        )
    }

    /// The directory the SDK ends up in.
    #[must_use]
    pub fn sdk_dir(&self) -> PathBuf {
        sdk_dir(&self.prefix)
    }
}

/// The SDK directory for an install root.
#[must_use]
pub fn sdk_dir(installed_root: &Path) -> PathBuf {
    installed_root.join(SDK_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_dir_defaults_to_prefix_bin() {
        let config = InstallConfig::new("/opt/gae");
        assert_eq!(config.tools_dir(), Some(PathBuf::from("/opt/gae/bin")));
    }

    #[test]
    fn tools_dir_uses_explicit_bindir() {
        let mut config = InstallConfig::new("/opt/gae");
        config.bindir = Some(PathBuf::from("/usr/local/bin"));
        assert_eq!(config.tools_dir(), Some(PathBuf::from("/usr/local/bin")));
    }

    #[test]
    fn no_bindir_disables_tools_dir() {
        let mut config = InstallConfig::new("/opt/gae");
        config.bindir = Some(PathBuf::from("/usr/local/bin"));
        config.no_bindir = true;
        assert_eq!(config.tools_dir(), None);
    }

    #[test]
    fn sdk_dir_is_under_prefix() {
        let config = InstallConfig::new("/opt/gae");
        assert_eq!(config.sdk_dir(), PathBuf::from("/opt/gae/google_appengine"));
    }

    #[test]
    fn default_http_settings() {
        let http = HttpSettings::default();
        assert_eq!(http.updatecheck_url, DEFAULT_UPDATECHECK_URL);
        assert!(http.user_agent.starts_with("appengine-sdk/"));
        assert_eq!(http.timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }
}
