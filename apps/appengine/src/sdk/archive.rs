//! Zip extraction for SDK archives.
//!
//! Entry names inside a downloaded archive are untrusted. Extraction runs in
//! two passes: the first plans every entry from the archive's directory and
//! rejects the whole archive if any name would land outside the destination;
//! the second writes files. A hostile archive therefore leaves nothing behind.

use std::collections::BTreeSet;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use zip::ZipArchive;

use crate::errors::SdkError;

/// One archive entry mapped onto the destination tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
}

/// Extracts a zip archive into `destination` and returns the install root.
///
/// When `overwrite` is false and any top-level entry of the archive already
/// exists under `destination`, nothing is written and
/// [`SdkError::AlreadyInstalled`] is returned. When it is true, existing
/// files are truncated and rewritten; files not in the archive are kept.
///
/// # Errors
///
/// Returns [`SdkError::ExtractionError`] if the archive is malformed, an
/// entry name escapes the destination, or a file cannot be written, and
/// [`SdkError::AlreadyInstalled`] as described above.
pub fn install<R: Read + Seek>(stream: R, destination: &Path, overwrite: bool) -> Result<PathBuf> {
    let mut archive = ZipArchive::new(stream)
        .map_err(|e| SdkError::extraction_with_source("failed to read zip archive", e))?;

    let destination = std::path::absolute(destination).map_err(|e| {
        SdkError::extraction_with_source(
            format!("invalid destination: {}", destination.display()),
            e,
        )
    })?;

    let plan = plan_entries(&mut archive)?;

    if !overwrite {
        for root in top_level_names(&plan) {
            let existing = destination.join(&root);
            if existing.symlink_metadata().is_ok() {
                return Err(SdkError::already_installed(existing).into());
            }
        }
    }

    std::fs::create_dir_all(&destination).map_err(|e| {
        SdkError::extraction_with_source(
            format!("failed to create directory: {}", destination.display()),
            e,
        )
    })?;

    for entry in &plan {
        extract_entry(&mut archive, entry, &destination)?;
    }

    tracing::info!(
        destination = %destination.display(),
        entries = plan.len(),
        "extracted archive"
    );
    Ok(destination)
}

/// Reads every entry name and maps it to a safe relative path.
fn plan_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<PlannedEntry>> {
    let mut plan = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|e| {
            SdkError::extraction_with_source(format!("failed to read archive entry {index}"), e)
        })?;
        let name = entry.name();
        let is_dir = name.ends_with('/') || name.ends_with('\\');

        let Some(relative) = normalize_entry_name(name)? else {
            continue;
        };

        plan.push(PlannedEntry {
            index,
            relative,
            is_dir,
        });
    }

    Ok(plan)
}

/// Strips leading separators and rejects names that climb out of the root.
///
/// Returns `None` for names that normalize to the root itself (such as `/`).
fn normalize_entry_name(name: &str) -> Result<Option<PathBuf>> {
    let trimmed = name.trim_start_matches(['/', '\\']);
    let mut relative = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SdkError::extraction(format!(
                    "entry escapes destination: {name}"
                ))
                .into());
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(relative))
}

/// First path component of every planned entry.
fn top_level_names(plan: &[PlannedEntry]) -> BTreeSet<PathBuf> {
    plan.iter()
        .filter_map(|entry| entry.relative.components().next())
        .map(|c| PathBuf::from(c.as_os_str()))
        .collect()
}

fn extract_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    entry: &PlannedEntry,
    destination: &Path,
) -> Result<()> {
    let output_path = destination.join(&entry.relative);

    if entry.is_dir {
        return create_dir(&output_path);
    }

    if let Some(parent) = output_path.parent() {
        create_dir(parent)?;
    }

    let mut file = archive.by_index(entry.index).map_err(|e| {
        SdkError::extraction_with_source(
            format!("failed to read entry: {}", entry.relative.display()),
            e,
        )
    })?;

    let mut outfile = std::fs::File::create(&output_path).map_err(|e| {
        SdkError::extraction_with_source(
            format!("failed to create file: {}", output_path.display()),
            e,
        )
    })?;

    std::io::copy(&mut file, &mut outfile).map_err(|e| {
        SdkError::extraction_with_source(
            format!("failed to extract: {}", output_path.display()),
            e,
        )
    })?;

    #[cfg(unix)]
    if let Some(mode) = file.unix_mode() {
        add_execute_bits(&output_path, mode)?;
    }

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        SdkError::extraction_with_source(format!("failed to create directory: {}", path.display()), e)
            .into()
    })
}

/// Carries the archive's execute bits over to the written file.
#[cfg(unix)]
fn add_execute_bits(path: &Path, archive_mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let exec = archive_mode & 0o111;
    if exec == 0 {
        return Ok(());
    }

    let mut perms = std::fs::metadata(path)
        .map_err(|e| {
            SdkError::extraction_with_source(format!("failed to get metadata: {}", path.display()), e)
        })?
        .permissions();
    perms.set_mode(perms.mode() | exec);
    std::fs::set_permissions(path, perms).map_err(|e| {
        SdkError::extraction_with_source(
            format!("failed to set permissions: {}", path.display()),
            e,
        )
        .into()
    })
}
