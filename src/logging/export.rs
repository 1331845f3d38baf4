//! Serialization of log snapshots for download.
use crate::types::{iso_timestamp, LogEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Renders entries as an indented JSON array.
pub fn export_json(entries: &[LogEntry]) -> Result<String> {
    serde_json::to_string_pretty(entries).context("Failed to serialize log export")
}

/// File name for an export taken at `now`, e.g. `logs-2024-01-01T00:00:00.000Z.json`.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("logs-{}.json", iso_timestamp(now))
}

/// Writes an export of `entries` into `dir` and returns the file path.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub fn export_to_dir(entries: &[LogEntry], dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory '{}'", dir.display()))?;

    // Colons are not portable in file names.
    let path = dir.join(export_file_name(Utc::now()).replace(':', "-"));
    std::fs::write(&path, export_json(entries)?)
        .with_context(|| format!("Failed to write export '{}'", path.display()))?;
    Ok(path)
}
