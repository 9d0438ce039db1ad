//! Server log discovery.
//!
//! The current log is the file in the log directory whose name matches
//! the configured glob and whose modification time is the most recent.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;

use super::error::WatcherError;

/// A matching log file with its modification time at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Compile a file-name glob.
///
/// # Errors
///
/// Returns [`WatcherError::InvalidPattern`] if `pattern` is not a valid glob.
pub fn compile_pattern(pattern: &str) -> Result<Pattern, WatcherError> {
    Pattern::new(pattern).map_err(|source| WatcherError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// List regular files in `dir` whose file name matches `pattern`.
///
/// Entries that vanish or cannot be inspected during the scan are skipped.
///
/// # Errors
///
/// Returns [`WatcherError::DirectoryUnreadable`] if `dir` cannot be listed.
pub fn matching_logs(dir: &Path, pattern: &Pattern) -> Result<Vec<LogCandidate>, WatcherError> {
    let entries = std::fs::read_dir(dir).map_err(|source| WatcherError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    Ok(entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        })
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            let modified = metadata.modified().ok()?;
            Some(LogCandidate {
                path: entry.path(),
                modified,
            })
        })
        .collect())
}

/// Find the most recently modified matching log.
///
/// Equal modification times are broken by path order, so the result is
/// stable for an unchanged directory.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn find_latest_log(dir: &Path, pattern: &Pattern) -> Result<Option<LogCandidate>, WatcherError> {
    Ok(matching_logs(dir, pattern)?
        .into_iter()
        .max_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.path.cmp(&b.path))
        }))
}
