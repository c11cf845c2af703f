//! Core data model for batch copy jobs.
//!
//! This module defines the main data structures:
//! - JobConfig: the caller-supplied configuration
//! - TransferJob: a validated job moving through its lifecycle
//! - Batch: a contiguous slice of the source file list
//! - FileItem: the outcome of copying one file
//! - JobSummary: the explicit result of a finished job

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cleaner::CleanupReport;
use crate::pool::DetachedWorkers;

/// Grace period the coordinator waits for the pool to drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Configuration of a batch copy job, as supplied by the caller.
///
/// Nothing is checked here; see `validate::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Directory whose direct children are copied
    pub source_path: PathBuf,

    /// Ordered destination directories; each entry may itself be a
    /// comma-delimited list
    pub destination_paths: Vec<String>,

    /// Upper bound on the number of source entries copied
    pub count_copy_files: usize,

    /// Number of files per batch
    pub batch_size: usize,

    /// Number of worker threads
    pub pool_size: usize,

    /// How files inside a batch are spread over destinations
    pub distribution: Distribution,

    /// Order in which source entries are taken
    pub source_order: SourceOrder,

    /// How long to wait for the pool to drain, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            source_path: PathBuf::new(),
            destination_paths: Vec::new(),
            count_copy_files: 0,
            batch_size: 0,
            pool_size: 1,
            distribution: Distribution::PerBatch,
            source_order: SourceOrder::Filesystem,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

/// Round-robin strategy used by each copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distribution {
    /// Every batch starts again at the first destination
    #[default]
    PerBatch,
    /// Assignment follows the file's position in the whole job
    Continuous,
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distribution::PerBatch => write!(f, "per-batch"),
            Distribution::Continuous => write!(f, "continuous"),
        }
    }
}

/// Order of the candidate source entries before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOrder {
    /// Directory enumeration order (not stable across platforms)
    #[default]
    Filesystem,
    /// Sorted by file name
    Name,
}

/// A configuration that passed validation. Immutable for the job's lifetime.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub source_path: PathBuf,
    /// Existing destination directories, in round-robin order
    pub destinations: Vec<PathBuf>,
    pub count_copy_files: usize,
    pub batch_size: usize,
    pub pool_size: usize,
    pub distribution: Distribution,
    pub source_order: SourceOrder,
    pub shutdown_timeout: Duration,
}

/// A batch copy job moving through create → plan → run.
#[derive(Debug)]
pub struct TransferJob {
    /// Unique identifier for this job
    pub id: Uuid,

    /// Validated configuration
    pub config: ValidatedJob,

    /// Current lifecycle state
    pub state: JobState,

    /// Batches produced by planning, consumed by running
    pub batches: Vec<Batch>,

    /// Outcome of emptying the destinations during planning
    pub cleanup: CleanupReport,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// Workers still copying after the grace period of `run_job`
    pub detached: DetachedWorkers,
}

impl TransferJob {
    /// Number of files across all planned batches.
    pub fn planned_files(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }

    /// Block until batches left running after the grace period are done.
    ///
    /// Returns the number of workers waited for; zero if the pool drained
    /// in time. The summary already returned is not updated.
    pub fn wait_for_detached(&mut self) -> usize {
        std::mem::take(&mut self.detached).join()
    }
}

/// The state of an entire job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Validated, destinations untouched
    Pending,
    /// Destinations cleaned and batches built
    Planned,
    /// Batches submitted to the pool
    Running,
    /// Bounded wait finished and summary produced
    Completed,
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Planned => "Planned",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
        }
    }
}

/// A contiguous, ordered slice of the truncated source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of this batch in the partition
    pub index: usize,

    /// Position of the first file in the truncated source list
    pub first_position: usize,

    /// Source entries, in enumeration order
    pub files: Vec<PathBuf>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The state of an individual file within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Not yet processed
    Pending,
    /// Copied to its destination
    Done,
    /// Copy primitive reported an error
    Failed,
}

impl FileState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Done | FileState::Failed)
    }
}

/// One source file bound to the destination the assigner picked for it.
#[derive(Debug, Clone, Serialize)]
pub struct FileItem {
    /// Source entry
    pub source_path: PathBuf,

    /// Destination directory the file was assigned to
    pub destination_dir: PathBuf,

    /// Index of `destination_dir` in the destination sequence
    pub destination_index: usize,

    /// Current state of this file
    pub state: FileState,

    /// Bytes written for this file
    pub bytes_copied: u64,

    /// OS error code if state is Failed
    pub error_code: Option<i32>,

    /// Human-readable error message
    pub error_message: Option<String>,
}

/// What one copy task did with its batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_index: usize,
    pub files: Vec<FileItem>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn copied(&self) -> usize {
        self.files.iter().filter(|f| f.state == FileState::Done).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.state == FileState::Failed).count()
    }

    pub fn bytes_copied(&self) -> u64 {
        self.files.iter().map(|f| f.bytes_copied).sum()
    }
}

/// Best-effort entry count of one destination after the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationCount {
    pub path: PathBuf,
    /// `None` when the directory could not be listed
    pub entries: Option<usize>,
}

/// A file that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub source_path: PathBuf,
    pub destination_dir: PathBuf,
    pub message: String,
}

/// Result of a finished (or timed out) job.
///
/// Counts only cover batches whose task reported back before the bounded
/// wait expired; `drained` tells whether that was all of them.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_planned: usize,
    pub batches_planned: usize,
    pub batches_completed: usize,
    pub files_attempted: usize,
    pub files_copied: usize,
    pub files_failed: usize,
    pub bytes_copied: u64,
    pub failures: Vec<FileFailure>,
    pub destinations: Vec<DestinationCount>,
    /// True if every worker finished within the grace period
    pub drained: bool,
    pub cleanup: CleanupReport,
}

impl JobSummary {
    /// True when every planned file was copied and the pool drained in time.
    pub fn is_complete_success(&self) -> bool {
        self.drained && self.files_failed == 0 && self.files_copied == self.files_planned
    }
}
