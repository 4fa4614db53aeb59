//! Count-based retention for date-prefixed log files
//!
//! Historical files of one stream are recognised by name only: anything in
//! the directory ending in `.{ext}` and containing `.{log_type}` belongs to
//! the stream, which also catches files renamed by external tools.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::error::{LogError, Result};

/// Format of the date prefix; lexicographic order equals chronological order
pub const DATE_PREFIX_FORMAT: &str = "%Y-%m-%d";

/// Result of one retention sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Files removed, oldest first
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed
    pub failed: Vec<LogError>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// Build `{date}.{log_type}.{ext}`
pub fn dated_file_name(date_prefix: &str, log_type: &str, extension: &str) -> String {
    format!("{}.{}.{}", date_prefix, log_type, extension)
}

/// List every file in `dir` belonging to `log_type`, sorted ascending by name
///
/// Directories and names that are not valid UTF-8 are skipped.
pub fn matching_files(dir: &Path, log_type: &str, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let type_marker = format!(".{}", log_type);
    let ext_suffix = format!(".{}", extension);
    let mut matches = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.ends_with(&ext_suffix) && name.contains(&type_marker) {
            matches.push(path);
        }
    }

    matches.sort();
    Ok(matches)
}

/// Pick the files to delete so that at most `retention_count` remain
///
/// Returns nothing while fewer than `retention_count` files exist, and
/// nothing when the count is 0 (unlimited). The active file is never selected.
pub fn retention_candidates(
    dir: &Path,
    log_type: &str,
    extension: &str,
    retention_count: usize,
    active: &Path,
) -> Result<Vec<PathBuf>> {
    let files = matching_files(dir, log_type, extension)?;
    let count = files.len();

    if count < retention_count {
        return Ok(Vec::new());
    }

    let delete_count = count - retention_count;
    if delete_count >= count {
        return Ok(Vec::new());
    }

    Ok(files
        .into_iter()
        .take(delete_count)
        .filter(|p| p != active)
        .collect())
}

/// Delete every candidate, continuing past individual failures
pub fn sweep(candidates: Vec<PathBuf>) -> SweepReport {
    let mut report = SweepReport::default();

    for path in candidates {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted stale log file {}", path.display());
                report.deleted.push(path);
            }
            Err(source) => {
                tracing::warn!("Could not delete stale log file {}: {}", path.display(), source);
                report.failed.push(LogError::RetentionSweep { path, source });
            }
        }
    }

    report
}

/// Locate the file of `log_type` for a `YYYY-MM-DD` date
///
/// Returns `Ok(None)` when the file does not exist.
pub fn find_log_file(
    dir: &Path,
    log_type: &str,
    extension: &str,
    date: &str,
) -> Result<Option<PathBuf>> {
    let parsed = NaiveDate::parse_from_str(date, DATE_PREFIX_FORMAT)
        .map_err(|_| LogError::config(format!("Date '{}' is not in YYYY-MM-DD format", date)))?;
    let prefix = parsed.format(DATE_PREFIX_FORMAT).to_string();

    let path = dir.join(dated_file_name(&prefix, log_type, extension));
    Ok(path.is_file().then_some(path))
}
