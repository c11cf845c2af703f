//! Configuration validation.
//!
//! Checks run in a fixed order and stop at the first failure. Nothing but
//! logging happens here; the destinations are only inspected, never touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::ValidationError;
use crate::model::{JobConfig, ValidatedJob};

/// Validate a job configuration.
///
/// # Errors
/// Returns the first failing `ValidationError`, in this order: missing
/// source, missing destination, zero count, zero batch size, batch size
/// above count, source not a directory, source empty, no usable destination.
pub fn validate(config: &JobConfig) -> Result<ValidatedJob, ValidationError> {
    let result = check(config);
    if let Err(e) = &result {
        error!(reason = %e, "Configuration rejected");
    }
    result
}

fn check(config: &JobConfig) -> Result<ValidatedJob, ValidationError> {
    require_source(&config.source_path)?;
    require_destinations(&config.destination_paths)?;
    require_positive_count(config.count_copy_files)?;
    require_positive_batch(config.batch_size)?;
    require_batch_within_count(config.count_copy_files, config.batch_size)?;
    require_directory(&config.source_path)?;
    require_entries(&config.source_path)?;

    let destinations = retain_directories(split_destinations(&config.destination_paths));
    if destinations.is_empty() {
        return Err(ValidationError::NoValidDestination);
    }

    info!(
        count = config.count_copy_files,
        batch_size = config.batch_size,
        source = %config.source_path.display(),
        destinations = destinations.len(),
        "Start to copy files"
    );

    Ok(ValidatedJob {
        source_path: config.source_path.clone(),
        destinations,
        count_copy_files: config.count_copy_files,
        batch_size: config.batch_size,
        pool_size: config.pool_size.max(1),
        distribution: config.distribution,
        source_order: config.source_order,
        shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
    })
}

/// Split every destination entry on `,`, keeping order and dropping empty
/// segments.
pub fn split_destinations(entries: &[String]) -> Vec<PathBuf> {
    entries
        .iter()
        .flat_map(|entry| entry.split(','))
        .filter(|segment| !segment.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn require_source(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::MissingSource);
    }
    Ok(())
}

// Entries are checked before splitting, so "," counts as given here and is
// rejected later as `NoValidDestination`.
fn require_destinations(entries: &[String]) -> Result<(), ValidationError> {
    if entries.iter().all(|entry| entry.is_empty()) {
        return Err(ValidationError::MissingDestination);
    }
    Ok(())
}

fn require_positive_count(count: usize) -> Result<(), ValidationError> {
    if count == 0 {
        return Err(ValidationError::InvalidCount);
    }
    Ok(())
}

fn require_positive_batch(batch_size: usize) -> Result<(), ValidationError> {
    if batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize);
    }
    Ok(())
}

fn require_batch_within_count(count: usize, batch_size: usize) -> Result<(), ValidationError> {
    if batch_size > count {
        return Err(ValidationError::BatchLargerThanCount { count, batch_size });
    }
    Ok(())
}

fn require_directory(path: &Path) -> Result<(), ValidationError> {
    if !path.is_dir() {
        return Err(ValidationError::SourceNotDirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn require_entries(path: &Path) -> Result<(), ValidationError> {
    let mut entries = fs::read_dir(path).map_err(|e| ValidationError::SourceUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if entries.next().is_none() {
        return Err(ValidationError::SourceEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn retain_directories(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    candidates
        .into_iter()
        .filter(|path| {
            let ok = path.is_dir();
            if !ok {
                warn!(
                    destination = %path.display(),
                    "Destination doesn't exist or is not a directory, dropping it"
                );
            }
            ok
        })
        .collect()
}
