//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the copy
//! engine from whatever consumes its events (CLI output, telemetry, tests).
//! Callbacks only observe; they cannot influence the job.

use crate::model::{BatchReport, FileItem, JobSummary, TransferJob};

/// Trait for receiving progress updates from a batch copy job.
///
/// File and batch callbacks are invoked from worker threads, possibly
/// concurrently, so implementations must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Called once all batches have been planned, before submission.
    fn on_job_started(&self, job: &TransferJob);

    /// Called after the copy primitive returned for one file.
    fn on_file_completed(&self, batch_index: usize, file: &FileItem);

    /// Called when a copy task has processed its whole batch.
    fn on_batch_completed(&self, report: &BatchReport);

    /// Called after the bounded wait, with the final summary.
    fn on_job_completed(&self, summary: &JobSummary);
}

/// A `ProgressCallback` that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_job_started(&self, _job: &TransferJob) {}

    fn on_file_completed(&self, _batch_index: usize, _file: &FileItem) {}

    fn on_batch_completed(&self, _report: &BatchReport) {}

    fn on_job_completed(&self, _summary: &JobSummary) {}
}
