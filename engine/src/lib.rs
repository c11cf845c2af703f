//! # BatchCopy Engine - Batched Fan-out Copy Library
//!
//! Copies a bounded number of files from one source directory into several
//! destination directories. The file list is cut into fixed-size batches,
//! each batch runs as one task on a worker pool, and inside a batch files
//! are handed to the destinations round-robin.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use engine::{create_job, plan_job, run_job, FsCopier, JobConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JobConfig {
//!     source_path: "/data/source".into(),
//!     destination_paths: vec!["/data/a,/data/b".to_string()],
//!     count_copy_files: 100,
//!     batch_size: 10,
//!     pool_size: 4,
//!     ..JobConfig::default()
//! };
//!
//! // Validate (no side effects on failure)
//! let mut job = create_job(&config)?;
//!
//! // Empty the destinations and build the batches
//! plan_job(&mut job)?;
//!
//! // Copy, wait for the pool, and collect the summary
//! let summary = run_job(&mut job, Arc::new(FsCopier), None)?;
//! println!("{} copied, {} failed", summary.files_copied, summary.files_failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (JobConfig, TransferJob, Batch, JobSummary)
//! - **error**: Error types
//! - **validate**: Ordered configuration checks
//! - **cleaner**: Emptying destination directories
//! - **partition**: Slicing the source list into batches
//! - **assign**: Round-robin destination assignment
//! - **task**: The per-batch copy task
//! - **pool**: Fixed-size worker pool
//! - **fs_ops**: Low-level filesystem operations and the copy primitive
//! - **job**: Job orchestration (create, plan, run)
//! - **progress**: Progress callback trait

pub mod model;
pub mod error;
pub mod validate;
pub mod cleaner;
pub mod partition;
pub mod assign;
pub mod task;
pub mod pool;
pub mod fs_ops;
pub mod job;
pub mod progress;

// Re-export main types and functions
pub use model::{
    Batch, BatchReport, DestinationCount, Distribution, FileFailure, FileItem, FileState,
    JobConfig, JobState, JobSummary, SourceOrder, TransferJob, ValidatedJob,
    DEFAULT_SHUTDOWN_TIMEOUT_MS,
};
pub use error::{CopyError, EngineError, PoolError, ValidationError};
pub use cleaner::{clean_destinations, CleanupReport};
pub use partition::{batch_count, partition};
pub use assign::RoundRobin;
pub use task::CopyTask;
pub use pool::{DetachedWorkers, ShutdownOutcome, WorkerPool};
pub use fs_ops::{FileCopier, FsCopier};
pub use job::{create_job, execute, plan_job, run_job};
pub use progress::{NoProgress, ProgressCallback};
pub use validate::validate;
