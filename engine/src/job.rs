//! Job orchestration module.
//!
//! This module provides the job lifecycle functions:
//! - Creating a job from a configuration (validation, no side effects)
//! - Planning a job (emptying destinations, listing and batching the source)
//! - Running a job (submitting batches to the pool, bounded wait, summary)

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::unbounded;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cleaner::{clean_destinations, CleanupReport};
use crate::error::EngineError;
use crate::fs_ops::{self, FileCopier, FsCopier};
use crate::model::{
    BatchReport, DestinationCount, FileFailure, FileState, JobConfig, JobState, JobSummary,
    TransferJob,
};
use crate::partition::partition;
use crate::pool::{DetachedWorkers, WorkerPool};
use crate::progress::{NoProgress, ProgressCallback};
use crate::task::CopyTask;
use crate::validate::validate;

fn expect_state(job: &TransferJob, expected: JobState) -> Result<(), EngineError> {
    if job.state != expected {
        return Err(EngineError::InvalidState {
            expected: expected.name(),
            actual: job.state.name(),
        });
    }
    Ok(())
}

/// Create a new job from a configuration.
///
/// # Errors
/// Returns `EngineError::Validation` with the first failing check. Nothing
/// on disk is touched in that case.
pub fn create_job(config: &JobConfig) -> Result<TransferJob, EngineError> {
    let validated = validate(config)?;

    Ok(TransferJob {
        id: Uuid::new_v4(),
        config: validated,
        state: JobState::Pending,
        batches: Vec::new(),
        cleanup: CleanupReport::default(),
        created_at: Utc::now(),
        detached: DetachedWorkers::default(),
    })
}

/// Plan a job: empty the destinations, then list and partition the source.
///
/// Cleaning finishes before any batch exists, so it never overlaps copying.
///
/// # Errors
/// Returns `EngineError::InvalidState` unless the job is Pending, and
/// `EngineError::EnumerationFailed` if the source cannot be listed.
pub fn plan_job(job: &mut TransferJob) -> Result<(), EngineError> {
    expect_state(job, JobState::Pending)?;

    job.cleanup = clean_destinations(&job.config.destinations);

    let entries = fs_ops::list_source_entries(&job.config.source_path, job.config.source_order)
        .map_err(|e| EngineError::EnumerationFailed {
            path: job.config.source_path.clone(),
            source: e,
        })?;

    job.batches = partition(entries, job.config.count_copy_files, job.config.batch_size);
    job.state = JobState::Planned;

    info!(
        job = %job.id,
        batches = job.batches.len(),
        files = job.planned_files(),
        removed = job.cleanup.removed,
        "Job planned"
    );
    Ok(())
}

/// Run a planned job.
///
/// Every batch becomes one `CopyTask` on a fresh worker pool. After
/// submission the pool is shut down and given the configured grace period;
/// batches still running after it keep going in the background and are
/// missing from the summary (`drained` is false). Their workers are parked
/// in the job; call `TransferJob::wait_for_detached` before exiting the
/// process, or those copies are cut off. Destination counts are re-listed
/// from disk and may therefore reflect an in-progress job.
///
/// # Errors
/// Returns `EngineError::InvalidState` unless the job is Planned, and
/// `EngineError::Pool` if the workers cannot be started or fed. A pool that
/// cannot be started leaves the job Planned with its batches intact. Per-file
/// copy failures are reported in the summary instead.
pub fn run_job(
    job: &mut TransferJob,
    copier: Arc<dyn FileCopier>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
) -> Result<JobSummary, EngineError> {
    expect_state(job, JobState::Planned)?;
    let pool = WorkerPool::new(job.config.pool_size)?;

    let progress = progress_callback
        .unwrap_or_else(|| Arc::new(NoProgress) as Arc<dyn ProgressCallback>);
    let started_at = Utc::now();
    job.state = JobState::Running;
    progress.on_job_started(job);

    let files_planned = job.planned_files();
    let batches = std::mem::take(&mut job.batches);
    let batches_planned = batches.len();

    let destinations: Arc<[PathBuf]> = job.config.destinations.clone().into();
    let (report_tx, report_rx) = unbounded::<BatchReport>();

    for batch in batches {
        let task = CopyTask::new(
            batch,
            destinations.clone(),
            job.config.distribution,
            copier.clone(),
        );
        let report_tx = report_tx.clone();
        let progress = progress.clone();
        pool.execute(move || {
            let report = task.run(progress.as_ref());
            let _ = report_tx.send(report);
        })?;
    }
    drop(report_tx);
    info!(job = %job.id, batches = batches_planned, workers = pool.size(), "Batches submitted");

    let outcome = pool.shutdown(job.config.shutdown_timeout);
    if !outcome.drained {
        warn!(
            job = %job.id,
            waited_ms = outcome.waited.as_millis() as u64,
            "Pool did not drain in time, reporting partial results"
        );
    }

    let reports: Vec<BatchReport> = report_rx.try_iter().collect();
    let summary = summarize(job, files_planned, batches_planned, &reports, outcome.drained, started_at);
    job.detached = outcome.detached;

    job.state = JobState::Completed;
    info!(
        job = %job.id,
        copied = summary.files_copied,
        failed = summary.files_failed,
        drained = summary.drained,
        "Copy finished"
    );
    progress.on_job_completed(&summary);

    Ok(summary)
}

/// Create, plan and run a job with the filesystem copier.
///
/// Returns only once every copy has ended. The summary still describes the
/// state at the end of the grace period.
pub fn execute(
    config: &JobConfig,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
) -> Result<JobSummary, EngineError> {
    let mut job = create_job(config)?;
    plan_job(&mut job)?;
    let summary = run_job(&mut job, Arc::new(FsCopier), progress_callback)?;
    job.wait_for_detached();
    Ok(summary)
}

fn summarize(
    job: &TransferJob,
    files_planned: usize,
    batches_planned: usize,
    reports: &[BatchReport],
    drained: bool,
    started_at: DateTime<Utc>,
) -> JobSummary {
    let files = reports.iter().flat_map(|r| r.files.iter());

    let mut files_attempted = 0;
    let mut files_copied = 0;
    let mut bytes_copied = 0;
    let mut failures = Vec::new();
    for file in files {
        files_attempted += 1;
        match file.state {
            FileState::Done => {
                files_copied += 1;
                bytes_copied += file.bytes_copied;
            }
            FileState::Failed => failures.push(FileFailure {
                source_path: file.source_path.clone(),
                destination_dir: file.destination_dir.clone(),
                message: file
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
            FileState::Pending => {}
        }
    }

    let destinations = job
        .config
        .destinations
        .iter()
        .map(|dir| {
            let entries = match fs_ops::count_entries(dir) {
                Ok(n) => {
                    info!(dir = %dir.display(), files = n, "Directory has files");
                    Some(n)
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot count destination entries");
                    None
                }
            };
            DestinationCount {
                path: dir.clone(),
                entries,
            }
        })
        .collect();

    JobSummary {
        job_id: job.id,
        created_at: job.created_at,
        started_at,
        finished_at: Utc::now(),
        files_planned,
        batches_planned,
        batches_completed: reports.len(),
        files_attempted,
        files_copied,
        files_failed: failures.len(),
        bytes_copied,
        failures,
        destinations,
        drained,
        cleanup: job.cleanup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CopyError, ValidationError};
    use crate::model::{BatchReport, Distribution, FileItem, SourceOrder};
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    struct Fixture {
        _temp: tempfile::TempDir,
        src: PathBuf,
        dst_a: PathBuf,
        dst_b: PathBuf,
    }

    /// Source with files f1..f<n> plus two empty destinations A and B.
    fn fixture(n: usize) -> Fixture {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp.path().join("source");
        let dst_a = temp.path().join("A");
        let dst_b = temp.path().join("B");
        fs::create_dir(&src).expect("Failed to create src dir");
        fs::create_dir(&dst_a).expect("Failed to create dst A");
        fs::create_dir(&dst_b).expect("Failed to create dst B");
        for i in 1..=n {
            fs::write(src.join(format!("f{}", i)), format!("data {}", i)).expect("Failed to write file");
        }
        Fixture {
            _temp: temp,
            src,
            dst_a,
            dst_b,
        }
    }

    fn config(fx: &Fixture, count: usize, batch_size: usize) -> JobConfig {
        JobConfig {
            source_path: fx.src.clone(),
            destination_paths: vec![format!(
                "{},{}",
                fx.dst_a.to_string_lossy(),
                fx.dst_b.to_string_lossy()
            )],
            count_copy_files: count,
            batch_size,
            pool_size: 3,
            source_order: SourceOrder::Name,
            ..JobConfig::default()
        }
    }

    fn listing(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .expect("Failed to list dir")
            .map(|e| e.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_five_files_two_destinations_per_batch() {
        let fx = fixture(5);

        let summary = execute(&config(&fx, 5, 2), None).expect("Job should run");

        assert!(summary.drained);
        assert!(summary.created_at <= summary.started_at);
        assert!(summary.started_at <= summary.finished_at);
        assert_eq!(summary.batches_planned, 3);
        assert_eq!(summary.batches_completed, 3);
        assert_eq!(summary.files_copied, 5);
        assert!(summary.is_complete_success());
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3", "f5"]));
        assert_eq!(listing(&fx.dst_b), set(&["f2", "f4"]));
        assert_eq!(summary.destinations[0].entries, Some(3));
        assert_eq!(summary.destinations[1].entries, Some(2));
    }

    #[test]
    fn test_per_batch_and_continuous_distribution_differ() {
        let fx = fixture(5);
        execute(&config(&fx, 5, 3), None).expect("Job should run");
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3", "f4"]));
        assert_eq!(listing(&fx.dst_b), set(&["f2", "f5"]));

        let continuous = JobConfig {
            distribution: Distribution::Continuous,
            ..config(&fx, 5, 3)
        };
        execute(&continuous, None).expect("Job should run");
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3", "f5"]));
        assert_eq!(listing(&fx.dst_b), set(&["f2", "f4"]));
    }

    #[test]
    fn test_count_above_source_size_copies_everything_once() {
        let fx = fixture(3);

        let summary = execute(&config(&fx, 10, 2), None).expect("Job should run");

        assert_eq!(summary.files_planned, 3);
        assert_eq!(summary.batches_planned, 2);
        assert_eq!(summary.files_copied, 3);
        let a = listing(&fx.dst_a);
        let b = listing(&fx.dst_b);
        assert!(a.is_disjoint(&b));
        assert_eq!(a.len() + b.len(), 3);
    }

    #[test]
    fn test_truncates_to_count() {
        let fx = fixture(6);

        let summary = execute(&config(&fx, 4, 4), None).expect("Job should run");

        assert_eq!(summary.files_planned, 4);
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3"]));
        assert_eq!(listing(&fx.dst_b), set(&["f2", "f4"]));
    }

    #[test]
    fn test_invalid_config_has_no_side_effects() {
        let fx = fixture(3);
        fs::write(fx.dst_a.join("keep.txt"), "x").expect("Failed to write file");

        let result = create_job(&config(&fx, 2, 3));

        assert!(matches!(
            result,
            Err(EngineError::Validation(ValidationError::BatchLargerThanCount { .. }))
        ));
        assert_eq!(listing(&fx.dst_a), set(&["keep.txt"]));
    }

    #[test]
    fn test_plan_cleans_destinations_first() {
        let fx = fixture(2);
        fs::write(fx.dst_a.join("stale.txt"), "x").expect("Failed to write file");
        fs::write(fx.dst_b.join("stale.txt"), "x").expect("Failed to write file");

        let mut job = create_job(&config(&fx, 2, 2)).expect("Failed to create job");
        assert!(fx.dst_a.join("stale.txt").exists(), "create must not clean");

        plan_job(&mut job).expect("Failed to plan job");
        assert_eq!(job.state, JobState::Planned);
        assert_eq!(job.cleanup.removed, 2);
        assert!(listing(&fx.dst_a).is_empty());
        assert_eq!(job.batches.len(), 1);

        let summary = run_job(&mut job, Arc::new(FsCopier), None).expect("Failed to run job");
        assert_eq!(summary.cleanup.removed, 2);
        assert_eq!(listing(&fx.dst_a), set(&["f1"]));
        assert_eq!(job.state, JobState::Completed);
        assert!(job.batches.is_empty(), "batches are consumed by the run");
    }

    #[test]
    fn test_lifecycle_order_is_enforced() {
        let fx = fixture(2);
        let mut job = create_job(&config(&fx, 2, 1)).expect("Failed to create job");

        let result = run_job(&mut job, Arc::new(FsCopier), None);
        assert!(matches!(result, Err(EngineError::InvalidState { .. })));

        plan_job(&mut job).expect("Failed to plan job");
        assert!(plan_job(&mut job).is_err(), "Second plan should fail");

        run_job(&mut job, Arc::new(FsCopier), None).expect("First run should succeed");
        assert!(run_job(&mut job, Arc::new(FsCopier), None).is_err(), "Second run should fail");
    }

    /// Fails every copy into destination B.
    struct FailingOnB {
        dst_b: PathBuf,
    }

    impl FileCopier for FailingOnB {
        fn copy_to_dir(&self, file: &Path, destination_dir: &Path) -> Result<u64, CopyError> {
            if destination_dir == self.dst_b {
                return Err(CopyError::Write {
                    path: destination_dir.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            FsCopier.copy_to_dir(file, destination_dir)
        }
    }

    #[test]
    fn test_copy_failures_do_not_abort_job() {
        let fx = fixture(5);
        let mut job = create_job(&config(&fx, 5, 2)).expect("Failed to create job");
        plan_job(&mut job).expect("Failed to plan job");

        let copier = Arc::new(FailingOnB {
            dst_b: fx.dst_b.clone(),
        });
        let summary = run_job(&mut job, copier, None).expect("Run should complete");

        assert!(summary.drained);
        assert_eq!(summary.files_attempted, 5);
        assert_eq!(summary.files_copied, 3);
        assert_eq!(summary.files_failed, 2);
        assert!(!summary.is_complete_success());
        assert!(summary.failures.iter().all(|f| f.destination_dir == fx.dst_b));
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3", "f5"]));
        assert!(listing(&fx.dst_b).is_empty());
    }

    #[test]
    fn test_source_subdirectory_fails_per_file() {
        let fx = fixture(2);
        fs::create_dir(fx.src.join("f0_dir")).expect("Failed to create subdir");

        let summary = execute(&config(&fx, 3, 3), None).expect("Job should run");

        assert_eq!(summary.files_attempted, 3);
        assert_eq!(summary.files_copied, 2);
        assert_eq!(summary.files_failed, 1);
        assert!(summary.failures[0].source_path.ends_with("f0_dir"));
    }

    #[derive(Default)]
    struct CountingProgress {
        calls: Mutex<Vec<String>>,
    }

    impl ProgressCallback for CountingProgress {
        fn on_job_started(&self, job: &TransferJob) {
            self.calls.lock().unwrap().push(format!("job_started({})", job.batches.len()));
        }

        fn on_file_completed(&self, _batch_index: usize, _file: &FileItem) {
            self.calls.lock().unwrap().push("file".to_string());
        }

        fn on_batch_completed(&self, _report: &BatchReport) {
            self.calls.lock().unwrap().push("batch".to_string());
        }

        fn on_job_completed(&self, summary: &JobSummary) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("job_completed({})", summary.files_copied));
        }
    }

    #[test]
    fn test_run_invokes_callbacks() {
        let fx = fixture(5);
        let progress = Arc::new(CountingProgress::default());

        execute(&config(&fx, 5, 2), Some(progress.clone())).expect("Job should run");

        let calls = progress.calls.lock().unwrap().clone();
        assert_eq!(calls.first().map(String::as_str), Some("job_started(3)"));
        assert_eq!(calls.last().map(String::as_str), Some("job_completed(5)"));
        assert_eq!(calls.iter().filter(|c| *c == "file").count(), 5);
        assert_eq!(calls.iter().filter(|c| *c == "batch").count(), 3);
    }

    /// Blocks long enough to outlive a short grace period.
    struct SlowCopier;

    impl FileCopier for SlowCopier {
        fn copy_to_dir(&self, file: &Path, destination_dir: &Path) -> Result<u64, CopyError> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            FsCopier.copy_to_dir(file, destination_dir)
        }
    }

    #[test]
    fn test_grace_period_expiry_reports_partial_results() {
        let fx = fixture(2);
        let slow = JobConfig {
            shutdown_timeout_ms: 10,
            pool_size: 1,
            ..config(&fx, 2, 1)
        };
        let mut job = create_job(&slow).expect("Failed to create job");
        plan_job(&mut job).expect("Failed to plan job");

        let summary = run_job(&mut job, Arc::new(SlowCopier), None).expect("Run should return");

        assert!(!summary.drained);
        assert!(summary.batches_completed < summary.batches_planned);
        assert!(!summary.is_complete_success());
        assert_eq!(job.state, JobState::Completed);
        job.wait_for_detached();
    }

    #[test]
    fn test_detached_batches_finish_after_wait() {
        let fx = fixture(4);
        let big = vec![7u8; 256 * 1024];
        for i in 1..=4 {
            fs::write(fx.src.join(format!("f{}", i)), &big).expect("Failed to write file");
        }
        let slow = JobConfig {
            shutdown_timeout_ms: 10,
            pool_size: 1,
            distribution: Distribution::Continuous,
            ..config(&fx, 4, 1)
        };
        let mut job = create_job(&slow).expect("Failed to create job");
        plan_job(&mut job).expect("Failed to plan job");

        let summary = run_job(&mut job, Arc::new(SlowCopier), None).expect("Run should return");
        assert!(!summary.drained);
        assert_eq!(job.detached.len(), 1);

        assert_eq!(job.wait_for_detached(), 1);
        assert!(job.detached.is_empty());
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3"]));
        assert_eq!(listing(&fx.dst_b), set(&["f2", "f4"]));
        for (dir, name) in [(&fx.dst_a, "f1"), (&fx.dst_b, "f2"), (&fx.dst_a, "f3"), (&fx.dst_b, "f4")] {
            assert_eq!(fs::read(dir.join(name)).expect("Failed to read copy"), big);
        }
    }

    #[test]
    fn test_execute_returns_after_every_copy() {
        let fx = fixture(3);
        let hurried = JobConfig {
            shutdown_timeout_ms: 0,
            pool_size: 1,
            distribution: Distribution::Continuous,
            ..config(&fx, 3, 1)
        };

        let summary = execute(&hurried, None).expect("Job should run");

        assert_eq!(summary.files_planned, 3);
        assert_eq!(listing(&fx.dst_a), set(&["f1", "f3"]));
        assert_eq!(listing(&fx.dst_b), set(&["f2"]));
    }

    #[test]
    fn test_pool_spawn_failure_leaves_job_planned() {
        let fx = fixture(3);
        let mut job = create_job(&config(&fx, 3, 1)).expect("Failed to create job");
        plan_job(&mut job).expect("Failed to plan job");

        crate::pool::FAIL_NEXT_SPAWN.with(|fail| fail.set(true));
        let result = run_job(&mut job, Arc::new(FsCopier), None);

        assert!(matches!(result, Err(EngineError::Pool(_))));
        assert_eq!(job.state, JobState::Planned);
        assert_eq!(job.batches.len(), 3);
        assert_eq!(job.planned_files(), 3);
        assert!(listing(&fx.dst_a).is_empty());

        let summary = run_job(&mut job, Arc::new(FsCopier), None).expect("Retry should run");
        assert_eq!(summary.files_copied, 3);
        assert_eq!(job.state, JobState::Completed);
    }
}
