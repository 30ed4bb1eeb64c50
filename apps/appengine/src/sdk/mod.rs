//! SDK installation pipeline.
//!
//! The pipeline runs five stages in order, each consuming only the output of
//! the previous one:
//!
//! - [`catalog`] - asks the update-check endpoint for the current release
//! - [`source`] - maps the requested identifier to a URL or local path
//! - [`fetch`] - produces a seekable stream over the archive bytes
//! - [`archive`] - unpacks the zip into the install prefix
//! - [`publish`] - links the SDK's tools into the tools directory
//!
//! Any stage failing aborts the run; there is no rollback of a partially
//! written prefix.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod publish;
pub mod source;
pub mod version;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use config::InstallConfig;
pub use publish::PublishReport;
pub use source::ResolvedSource;
use version::SdkVersion;

/// Identifier that selects the catalog's current release.
pub const LATEST: &str = "latest";

/// Name of the install record written inside the SDK directory.
pub const INSTALL_RECORD_FILE: &str = ".install.json";

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Where the archive came from.
    pub source: ResolvedSource,
    /// The unpacked SDK directory.
    pub sdk_dir: PathBuf,
    /// Tools directory and what was published there, unless disabled.
    pub tools: Option<(PathBuf, PublishReport)>,
}

/// Record of an installation, stored as `google_appengine/.install.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// The identifier that was installed (version, URL or path).
    pub requested: String,
    /// The resolved download URL or archive path.
    pub source: String,
    /// Seconds since the Unix epoch when the install finished.
    pub installed_at: u64,
    /// Tools published by this install.
    pub tools: Vec<String>,
}

impl InstallRecord {
    /// Reads the record from an SDK directory, if present and valid.
    #[must_use]
    pub fn load(sdk_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(sdk_dir.join(INSTALL_RECORD_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Writes the record into an SDK directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, sdk_dir: &Path) -> Result<()> {
        let path = sdk_dir.join(INSTALL_RECORD_FILE);
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize install record")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write install record: {}", path.display()))
    }
}

/// The identifier to resolve: the current release unless one was given.
fn requested_identifier(sdk: Option<&str>, current: &SdkVersion) -> String {
    match sdk {
        Some(sdk) if !sdk.eq_ignore_ascii_case(LATEST) => sdk.to_string(),
        _ => current.literal().to_string(),
    }
}

/// Runs the whole pipeline for `config`.
///
/// # Errors
///
/// Returns the first stage error; see [`crate::errors::SdkError`] for the
/// kinds that can occur.
pub async fn run(config: &InstallConfig) -> Result<InstallReport> {
    let current = catalog::current_version(&config.http).await?;

    let requested = requested_identifier(config.sdk.as_deref(), &current);

    let source = source::resolve(&requested, &current)?;
    println!("Fetching SDK from {source}...");

    let stream = fetch::open(&source, &config.http).await?;

    println!("Extracting into {}...", config.prefix.display());
    let installed_root = archive::install(stream, &config.prefix, config.force)?;
    let sdk_dir = config::sdk_dir(&installed_root);

    let tools = match config.tools_dir() {
        Some(tools_dir) => {
            let report = publish::publish(&installed_root, &tools_dir, config.force)?;
            Some((tools_dir, report))
        }
        None => None,
    };

    if sdk_dir.is_dir() {
        let record = InstallRecord {
            requested,
            source: source.to_string(),
            installed_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            tools: tools
                .as_ref()
                .map(|(_, report)| report.published.clone())
                .unwrap_or_default(),
        };
        record.save(&sdk_dir)?;
    }

    Ok(InstallReport {
        source,
        sdk_dir,
        tools,
    })
}
