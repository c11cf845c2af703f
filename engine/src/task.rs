//! The per-batch copy task run by the worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::assign::RoundRobin;
use crate::fs_ops::FileCopier;
use crate::model::{Batch, BatchReport, Distribution, FileItem, FileState};
use crate::progress::ProgressCallback;

/// One batch bound to the job's destination sequence and copy primitive.
///
/// Holds nothing mutable that another task can see: the destinations and
/// the copier are shared read-only, the round-robin counter lives in `run`.
pub struct CopyTask {
    batch: Batch,
    destinations: Arc<[PathBuf]>,
    distribution: Distribution,
    copier: Arc<dyn FileCopier>,
}

impl CopyTask {
    pub fn new(
        batch: Batch,
        destinations: Arc<[PathBuf]>,
        distribution: Distribution,
        copier: Arc<dyn FileCopier>,
    ) -> Self {
        CopyTask {
            batch,
            destinations,
            distribution,
            copier,
        }
    }

    /// Copy every file of the batch, in order, to its round-robin destination.
    ///
    /// A failed file is logged and recorded; the remaining files still run.
    pub fn run(self, progress: &dyn ProgressCallback) -> BatchReport {
        let started = Instant::now();
        let batch_index = self.batch.index;

        if self.batch.is_empty() {
            error!(batch = batch_index, "Empty batch, nothing to copy");
            let report = BatchReport {
                batch_index,
                files: Vec::new(),
                elapsed: started.elapsed(),
            };
            progress.on_batch_completed(&report);
            return report;
        }

        let mut assigner = RoundRobin::for_batch(&self.destinations, &self.batch, self.distribution);
        let mut files = Vec::with_capacity(self.batch.len());

        for source in &self.batch.files {
            let Some((destination_index, dir)) = assigner.next() else {
                break;
            };

            let mut item = FileItem {
                source_path: source.clone(),
                destination_dir: dir.to_path_buf(),
                destination_index,
                state: FileState::Pending,
                bytes_copied: 0,
                error_code: None,
                error_message: None,
            };

            match self.copier.copy_to_dir(source, dir) {
                Ok(bytes) => {
                    info!(file = %source.display(), destination = %dir.display(), "Copy");
                    item.state = FileState::Done;
                    item.bytes_copied = bytes;
                }
                Err(e) => {
                    error!(
                        file = %source.display(),
                        destination = %dir.display(),
                        error = %e,
                        "Error while copying"
                    );
                    item.state = FileState::Failed;
                    item.error_code = e.raw_os_error();
                    item.error_message = Some(e.to_string());
                }
            }

            progress.on_file_completed(batch_index, &item);
            files.push(item);
        }

        let report = BatchReport {
            batch_index,
            files,
            elapsed: started.elapsed(),
        };
        debug!(
            batch = batch_index,
            copied = report.copied(),
            failed = report.failed(),
            duration_ms = report.elapsed.as_millis() as u64,
            "Batch finished"
        );
        progress.on_batch_completed(&report);
        report
    }
}
