//! Stale-build cleanup for the shared dist directory.
//!
//! An entry survives when its name ends with `<version>.tar.gz` or
//! `<version>.zip`, or when it is on the protected allow-list. Everything else
//! is removed. Removal is attempted per entry and never aborts the scan.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::error::CleanupError;
use crate::models::{CleanupReport, DeletionOutcome, EntryClass, Version};

/// Classify one directory entry name.
pub fn classify_entry(name: &str, version: &Version, protected: &[String]) -> EntryClass {
    if protected.iter().any(|p| p == name) {
        EntryClass::Protected
    } else if version
        .artifact_suffixes()
        .iter()
        .any(|suffix| name.ends_with(suffix.as_str()))
    {
        EntryClass::Current
    } else {
        EntryClass::Stale
    }
}

/// Delete every stale entry in `dist_dir`.
///
/// Must only run after all archive writers have finished. Fails as a whole only
/// when the directory itself cannot be listed.
pub fn cleanup_stale_builds(
    dist_dir: &Path,
    version: &Version,
    protected: &[String],
) -> Result<CleanupReport, CleanupError> {
    let read_dir = |source| CleanupError::ReadDir {
        path: dist_dir.to_path_buf(),
        source,
    };

    // Raw names address the entry on disk; lossy names are for matching and reporting
    let mut entries: Vec<(String, OsString)> = Vec::new();
    for entry in fs::read_dir(dist_dir).map_err(read_dir)? {
        let raw = entry.map_err(read_dir)?.file_name();
        entries.push((raw.to_string_lossy().into_owned(), raw));
    }
    entries.sort();

    let mut report = CleanupReport::default();
    for (name, raw) in entries {
        match classify_entry(&name, version, protected) {
            EntryClass::Current | EntryClass::Protected => report.kept.push(name),
            EntryClass::Stale => {
                let result = remove_entry(&dist_dir.join(&raw));
                match result {
                    Ok(()) => log::info!("Deleted old build file: {}", name),
                    Err(ref e) => log::warn!("Could not delete {}: {}", name, e),
                }
                report.outcomes.push(DeletionOutcome { entry: name, result });
            }
        }
    }

    Ok(report)
}

/// Remove a single file; directories are refused.
fn remove_entry(path: &Path) -> Result<(), CleanupError> {
    let is_dir = fs::symlink_metadata(path)
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        return Err(CleanupError::IsDirectory(path.to_path_buf()));
    }

    fs::remove_file(path).map_err(|source| CleanupError::Remove {
        path: path.to_path_buf(),
        source,
    })
}
