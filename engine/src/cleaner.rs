//! Emptying destination directories before a job copies into them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of `clean_destinations`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries deleted
    pub removed: usize,
    /// Entries (or whole directories) that could not be deleted or listed
    pub failed: usize,
}

/// Delete the direct children of every destination directory.
///
/// Files are removed with `remove_file`. Subdirectories are not entered: a
/// single `remove_dir` is attempted, which fails when they are not empty.
/// Every failure is logged and counted; cleaning always carries on.
pub fn clean_destinations(destinations: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for dir in destinations {
        clean_directory(dir, &mut report);
    }
    report
}

fn clean_directory(dir: &Path, report: &mut CleanupReport) {
    debug!(dir = %dir.display(), "Remove files");

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list destination for cleaning");
            report.failed += 1;
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read destination entry");
                report.failed += 1;
                continue;
            }
        };

        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let result = if is_dir {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                debug!(file = %path.display(), "Removed");
                report.removed += 1;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to remove");
                report.failed += 1;
            }
        }
    }
}
