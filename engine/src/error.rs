//! Error types for the batch copy engine.
//!
//! The job-level error type is `EngineError`, which represents failures that
//! prevent a job from being executed at all. Per-file copy failures are
//! recorded in `FileItem` and never escalate into an `EngineError`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a `JobConfig` is rejected, in the order the validator checks them.
///
/// Validation short-circuits: only the first failing reason is reported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No source directory was given
    #[error("no source folder path (check parameter \"source\")")]
    MissingSource,

    /// No destination directories were given
    #[error("no destination folder paths (check parameter \"destination\")")]
    MissingDestination,

    /// `count_copy_files` is zero
    #[error("count of files to copy must be bigger than 0 (check parameter \"count\")")]
    InvalidCount,

    /// `batch_size` is zero
    #[error("batch size must be bigger than 0 (check parameter \"batch-size\")")]
    InvalidBatchSize,

    /// `batch_size` exceeds `count_copy_files`
    #[error("batch size {batch_size} is bigger than count of files to copy {count}")]
    BatchLargerThanCount { count: usize, batch_size: usize },

    /// Source path is missing or not a directory
    #[error("source folder {} doesn't exist or is not a directory", .path.display())]
    SourceNotDirectory { path: PathBuf },

    /// Source directory could not be listed
    #[error("source folder {} could not be read: {message}", .path.display())]
    SourceUnreadable { path: PathBuf, message: String },

    /// Source directory has no entries
    #[error("no files to copy found in {}", .path.display())]
    SourceEmpty { path: PathBuf },

    /// Every destination entry was dropped
    #[error("no valid destination folders (check parameter \"destination\")")]
    NoValidDestination,
}

/// Failure of the copy primitive for one file and one destination.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Source entry is not a regular file (e.g. a subdirectory)
    #[error("{} is not a regular file", .path.display())]
    NotAFile { path: PathBuf },

    /// Source entry has no file name to copy under
    #[error("{} has no file name", .path.display())]
    NoFileName { path: PathBuf },

    /// Failed to read from the source file
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    /// Failed to write the destination file
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl CopyError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Worker pool failures.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    /// The pool no longer accepts tasks
    #[error("worker pool is shut down")]
    Closed,
}

/// Errors that stop a job before or while it is scheduled.
///
/// Copy and cleanup failures are logged and counted instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected by the validator
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to enumerate the source directory after validation
    #[error("failed to enumerate {}: {source}", .path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Worker pool could not be built or fed
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Lifecycle function called in the wrong job state
    #[error("job is in state {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::EnumerationFailed { source, .. } => source.raw_os_error(),
            Self::Pool(PoolError::Spawn(source)) => source.raw_os_error(),
            _ => None,
        }
    }
}
