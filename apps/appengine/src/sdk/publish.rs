//! Tool publishing.
//!
//! The SDK ships its command-line tools as Python scripts directly under
//! `google_appengine/`. Publishing marks them executable and links each one
//! into a tools directory. Links point back into the SDK tree, so a later
//! in-place reinstall updates the published tools without republishing.
//!
//! Where symbolic links are unavailable the tool is copied instead, and its
//! name is recorded in [`COPIED_MANIFEST`] inside the tools directory.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Result;

use super::config::sdk_dir;
use crate::errors::SdkError;

/// Extension of the SDK's command-line tools.
pub const TOOL_EXTENSION: &str = ".py";

/// Manifest of tools that were copied rather than linked.
pub const COPIED_MANIFEST: &str = ".appengine-copied-tools.json";

/// What [`publish`] did with each tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Tools linked (or copied) into the tools directory.
    pub published: Vec<String>,
    /// Tools left alone because a destination already existed.
    pub skipped: Vec<String>,
    /// Published tools that were copied rather than linked.
    pub copied: Vec<String>,
}

/// How a tool ended up in the tools directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Symlink,
    Copy,
}

/// Publishes the SDK's tools from `installed_root` into `tools_dir`.
///
/// With `overwrite`, existing destinations are replaced; without it they are
/// reported as skipped.
///
/// # Errors
///
/// Returns [`SdkError::PublishError`] on any filesystem failure other than a
/// destination that already exists or has already been removed.
pub fn publish(installed_root: &Path, tools_dir: &Path, overwrite: bool) -> Result<PublishReport> {
    let source_dir = sdk_dir(installed_root);
    let tools = list_tools(&source_dir)?;

    std::fs::create_dir_all(tools_dir).map_err(|e| {
        SdkError::publish_with_source(
            format!("failed to create tools directory: {}", tools_dir.display()),
            e,
        )
    })?;

    let mut report = PublishReport::default();
    let mut linked = Vec::new();

    for name in tools {
        let source = source_dir.join(&name);
        let dest = tools_dir.join(&name);

        set_executable(&source)?;

        if overwrite {
            remove_existing(&dest)?;
        } else if dest.symlink_metadata().is_ok() {
            tracing::debug!(tool = %name, "destination exists, skipping");
            report.skipped.push(name);
            continue;
        }

        match link_tool(&source, &dest) {
            Ok(kind) => {
                match kind {
                    LinkKind::Copy => report.copied.push(name.clone()),
                    LinkKind::Symlink => linked.push(name.clone()),
                }
                tracing::debug!(tool = %name, ?kind, "published tool");
                report.published.push(name);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists && !overwrite => {
                report.skipped.push(name);
            }
            Err(e) => {
                return Err(SdkError::publish_with_source(
                    format!(
                        "failed to link {} to {}",
                        dest.display(),
                        source.display()
                    ),
                    e,
                )
                .into());
            }
        }
    }

    update_copies(tools_dir, &report.copied, &linked)?;

    tracing::info!(
        published = report.published.len(),
        skipped = report.skipped.len(),
        tools_dir = %tools_dir.display(),
        "published tools"
    );
    Ok(report)
}

/// Names of the tool scripts directly inside `source_dir`, sorted.
fn list_tools(source_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(source_dir).map_err(|e| {
        SdkError::publish_with_source(
            format!("failed to read SDK directory: {}", source_dir.display()),
            e,
        )
    })?;

    let mut tools = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            SdkError::publish_with_source("failed to read directory entry", e)
        })?;
        let is_file = entry.file_type().is_ok_and(|t| t.is_file());
        if is_file
            && let Some(name) = entry.file_name().to_str()
            && name.ends_with(TOOL_EXTENSION)
        {
            tools.push(name.to_string());
        }
    }

    tools.sort();
    Ok(tools)
}

/// Adds execute permission for owner, group and others, keeping other bits.
#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| {
            SdkError::publish_with_source(format!("failed to get metadata: {}", path.display()), e)
        })?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(|e| {
        SdkError::publish_with_source(format!("failed to set permissions: {}", path.display()), e)
            .into()
    })
}

/// Execute bits are not managed this way on non-Unix targets.
#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Removes a destination file or link, tolerating its absence.
fn remove_existing(dest: &Path) -> Result<()> {
    match std::fs::remove_file(dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SdkError::publish_with_source(
            format!("failed to remove existing tool: {}", dest.display()),
            e,
        )
        .into()),
    }
}

#[cfg(unix)]
fn link_tool(source: &Path, dest: &Path) -> std::io::Result<LinkKind> {
    std::os::unix::fs::symlink(source, dest)?;
    Ok(LinkKind::Symlink)
}

#[cfg(windows)]
fn link_tool(source: &Path, dest: &Path) -> std::io::Result<LinkKind> {
    match std::os::windows::fs::symlink_file(source, dest) {
        Ok(()) => Ok(LinkKind::Symlink),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(_) => std::fs::copy(source, dest).map(|_| LinkKind::Copy),
    }
}

#[cfg(not(any(unix, windows)))]
fn link_tool(source: &Path, dest: &Path) -> std::io::Result<LinkKind> {
    if dest.symlink_metadata().is_ok() {
        return Err(std::io::Error::from(ErrorKind::AlreadyExists));
    }
    std::fs::copy(source, dest).map(|_| LinkKind::Copy)
}

/// Brings the copied-tools manifest in line with this run.
///
/// Newly copied tools are added and tools now published as links are
/// dropped. The manifest is removed once it lists nothing.
fn update_copies(tools_dir: &Path, copied: &[String], linked: &[String]) -> Result<()> {
    let path = tools_dir.join(COPIED_MANIFEST);
    let before: BTreeSet<String> = read_copies(&path).into_iter().collect();
    let mut all = before.clone();
    all.extend(copied.iter().cloned());
    for name in linked {
        all.remove(name);
    }

    if all == before {
        return Ok(());
    }

    if all.is_empty() {
        return remove_existing(&path);
    }

    let content = serde_json::to_string_pretty(&all).map_err(|e| {
        SdkError::publish_with_source("failed to serialize copied-tools manifest", e)
    })?;
    std::fs::write(&path, content).map_err(|e| {
        SdkError::publish_with_source(format!("failed to write {}", path.display()), e).into()
    })
}

/// Reads the copied-tools manifest; a missing or unreadable one is empty.
fn read_copies(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}
