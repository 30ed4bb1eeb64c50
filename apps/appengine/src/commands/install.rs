//! Install command for the appengine CLI.
//!
//! Resolves flags and environment variables into an [`InstallConfig`] and
//! runs the install pipeline.
//!
//! ## Usage
//!
//! ```bash
//! appengine                      # Install the current release
//! appengine 1.9.40               # Install a specific release
//! appengine ./google_appengine_1.9.40.zip --prefix /opt/gae
//! appengine https://mirror.example.com/sdk.zip --force
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::sdk::config::DEFAULT_UPDATECHECK_URL;
use crate::sdk::{self, InstallConfig, InstallRecord, PublishReport};

/// Environment variable naming the SDK when no positional argument is given.
pub const SDK_VERSION_ENV: &str = "APPENGINEPY_SDK_VERSION";

/// Environment variable overriding the default install prefix.
pub const PREFIX_ENV: &str = "APPENGINE_PREFIX";

/// Environment variable overriding the update-check endpoint.
pub const UPDATECHECK_URL_ENV: &str = "APPENGINEPY_UPDATECHECK_URL";

/// Arguments for the install command.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// SDK to install: a version such as 1.9.40, "latest", a URL or a zip path.
    ///
    /// Defaults to $APPENGINEPY_SDK_VERSION, then to the current release.
    #[arg(value_name = "SDK")]
    pub sdk: Option<String>,

    /// Install the SDK in DIR.
    #[arg(short = 'p', long = "prefix", value_name = "DIR")]
    pub prefix: Option<PathBuf>,

    /// Install tools in DIR (default: PREFIX/bin).
    #[arg(short = 'b', long = "bindir", value_name = "DIR")]
    pub bindir: Option<PathBuf>,

    /// Over-write an existing installation.
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Do not install tools.
    #[arg(short = 'n', long = "no-bindir")]
    pub no_bindir: bool,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be resolved or any pipeline
/// stage fails.
pub async fn execute(args: &InstallArgs) -> Result<()> {
    let config = build_config(args, |key| std::env::var(key).ok())?;
    tracing::debug!(?config, "install configuration");

    if let Some(previous) = InstallRecord::load(&config.sdk_dir()) {
        tracing::info!(
            requested = %previous.requested,
            source = %previous.source,
            "found existing installation"
        );
    }

    let report = sdk::run(&config).await?;

    println!(
        "SDK installed in {} (from {})",
        report.sdk_dir.display(),
        report.source
    );

    if let Some((tools_dir, publish)) = &report.tools {
        for line in tool_summary(tools_dir, publish) {
            println!("{line}");
        }
    }

    Ok(())
}

/// One line per published or skipped tool, plus a note about copies made
/// by this run.
fn tool_summary(tools_dir: &Path, publish: &PublishReport) -> Vec<String> {
    let mut lines = Vec::new();
    for name in &publish.published {
        let verb = if publish.copied.contains(name) {
            "copied"
        } else {
            "linked"
        };
        lines.push(format!("  {verb} {}", tools_dir.join(name).display()));
    }
    for name in &publish.skipped {
        lines.push(format!(
            "  skipped {} (already exists, use --force to replace)",
            tools_dir.join(name).display()
        ));
    }
    if !publish.copied.is_empty() {
        lines.push(format!(
            "Note: {} tool(s) were copied rather than linked and will not follow SDK upgrades.",
            publish.copied.len()
        ));
    }
    lines
}

/// Builds the pipeline configuration from arguments and an environment lookup.
///
/// Empty or whitespace-only environment values are treated as unset.
fn build_config(
    args: &InstallArgs,
    env: impl Fn(&str) -> Option<String>,
) -> Result<InstallConfig> {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let prefix = match &args.prefix {
        Some(prefix) => prefix.clone(),
        None => match env(PREFIX_ENV) {
            Some(prefix) => PathBuf::from(prefix),
            None => default_prefix()?,
        },
    };

    let mut config = InstallConfig::new(prefix);
    config.sdk = args.sdk.clone().or_else(|| env(SDK_VERSION_ENV));
    config.bindir.clone_from(&args.bindir);
    config.force = args.force;
    config.no_bindir = args.no_bindir;
    config.http.updatecheck_url = env(UPDATECHECK_URL_ENV)
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| DEFAULT_UPDATECHECK_URL.to_string());

    Ok(config)
}

/// `~/.appengine` on every platform.
fn default_prefix() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Cannot determine home directory; pass --prefix")?
        .join(".appengine"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args() -> InstallArgs {
        InstallArgs {
            sdk: None,
            prefix: Some(PathBuf::from("/opt/gae")),
            bindir: None,
            force: false,
            no_bindir: false,
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn positional_sdk_wins_over_env() {
        let mut args = args();
        args.sdk = Some("1.9.40".to_string());
        let config = build_config(&args, env_of(&[(SDK_VERSION_ENV, "1.9.30")]))
            .expect("Should build");
        assert_eq!(config.sdk.as_deref(), Some("1.9.40"));
    }

    #[test]
    fn env_sdk_used_without_positional() {
        let config = build_config(&args(), env_of(&[(SDK_VERSION_ENV, "1.9.30")]))
            .expect("Should build");
        assert_eq!(config.sdk.as_deref(), Some("1.9.30"));
    }

    #[test]
    fn blank_env_sdk_is_ignored() {
        let config =
            build_config(&args(), env_of(&[(SDK_VERSION_ENV, "  ")])).expect("Should build");
        assert_eq!(config.sdk, None);
    }

    #[test]
    fn prefix_flag_wins_over_env() {
        let config = build_config(&args(), env_of(&[(PREFIX_ENV, "/elsewhere")]))
            .expect("Should build");
        assert_eq!(config.prefix, PathBuf::from("/opt/gae"));
    }

    #[test]
    fn prefix_env_used_without_flag() {
        let mut args = args();
        args.prefix = None;
        let config =
            build_config(&args, env_of(&[(PREFIX_ENV, "/elsewhere")])).expect("Should build");
        assert_eq!(config.prefix, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn updatecheck_url_override() {
        let config = build_config(
            &args(),
            env_of(&[(UPDATECHECK_URL_ENV, " http://mirror.local/api/updatecheck ")]),
        )
        .expect("Should build");
        assert_eq!(
            config.http.updatecheck_url,
            "http://mirror.local/api/updatecheck"
        );
    }

    #[test]
    fn summary_notes_only_copies_from_this_run() {
        let tools_dir = Path::new("/opt/gae/bin");
        let publish = PublishReport {
            published: vec!["appcfg.py".to_string(), "dev_appserver.py".to_string()],
            skipped: vec!["old.py".to_string()],
            copied: vec!["dev_appserver.py".to_string()],
        };

        let lines = tool_summary(tools_dir, &publish);

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("  linked ") && lines[0].ends_with("appcfg.py"));
        assert!(lines[1].starts_with("  copied ") && lines[1].ends_with("dev_appserver.py"));
        assert!(lines[2].starts_with("  skipped "));
        assert!(lines[3].starts_with("Note: 1 tool(s) were copied"));
    }

    #[test]
    fn summary_has_no_note_when_everything_is_linked() {
        let publish = PublishReport {
            published: vec!["appcfg.py".to_string()],
            ..PublishReport::default()
        };
        let lines = tool_summary(Path::new("/bin"), &publish);
        assert_eq!(lines.len(), 1);
        assert!(!lines.iter().any(|l| l.starts_with("Note:")));
    }

    #[test]
    fn flags_are_carried_over() {
        let mut args = args();
        args.bindir = Some(PathBuf::from("/usr/local/bin"));
        args.force = true;
        args.no_bindir = true;
        let config = build_config(&args, env_of(&[])).expect("Should build");
        assert_eq!(config.bindir, Some(PathBuf::from("/usr/local/bin")));
        assert!(config.force);
        assert!(config.no_bindir);
        assert_eq!(config.http.updatecheck_url, DEFAULT_UPDATECHECK_URL);
    }
}
