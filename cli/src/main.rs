//! BatchCopy - Command-line interface for the batch copy engine.
//!
//! Builds a `JobConfig` from flags and an optional TOML file, sets up
//! logging, runs the job and maps the summary to an exit status:
//! 0 when everything was copied, 1 when some files failed or the pool did
//! not drain in time, 2 when the job could not run at all.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use engine::{
    create_job, plan_job, run_job, BatchReport, Distribution, FileItem, FileState, FsCopier,
    JobConfig, JobSummary, ProgressCallback, SourceOrder, TransferJob,
};

/// BatchCopy - spread files from one folder across several folders
#[derive(Parser, Debug)]
#[command(name = "batchcopy")]
#[command(version)]
#[command(about = "Copy files from one folder into several folders, in batches, in parallel")]
struct Args {
    /// Source directory (only its direct children are copied)
    #[arg(long, value_name = "PATH")]
    source: Option<PathBuf>,

    /// Destination directories, comma-separated or repeated
    #[arg(long, value_name = "PATHS", value_delimiter = ',')]
    destination: Vec<String>,

    /// Maximum number of source entries to copy
    #[arg(long, value_name = "N")]
    count: Option<usize>,

    /// Number of files per batch
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Number of worker threads
    #[arg(long, value_name = "N")]
    pool_size: Option<usize>,

    /// Round-robin mode: per-batch or continuous
    #[arg(long, value_name = "MODE")]
    distribution: Option<String>,

    /// Source order: filesystem or name
    #[arg(long, value_name = "ORDER")]
    source_order: Option<String>,

    /// How long to wait for running batches after submission
    #[arg(long, value_name = "MS")]
    shutdown_timeout_ms: Option<u64>,

    /// TOML file with job settings; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, conflicts_with = "verbose")]
    quiet: bool,
}

/// CLI implementation of ProgressCallback for displaying copy progress
struct CliProgress {
    verbose: bool,
    files_done: AtomicUsize,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            files_done: AtomicUsize::new(0),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let millis = elapsed.as_millis();
        let secs = elapsed.as_secs();
        let mins = secs / 60;

        if mins > 0 {
            format!("{}m {}s", mins, secs % 60)
        } else if secs > 0 {
            format!("{}s", secs)
        } else {
            format!("{}ms", millis)
        }
    }

    fn file_name(path: &Path) -> &str {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("(unknown)")
    }
}

impl ProgressCallback for CliProgress {
    fn on_job_started(&self, job: &TransferJob) {
        eprintln!("Preparing copy...");
        eprintln!("  Source: {}", job.config.source_path.display());
        for (i, dir) in job.config.destinations.iter().enumerate() {
            eprintln!("  Destination {}: {}", i, dir.display());
        }
        eprintln!(
            "  Total: {} files in {} batches of up to {} ({} distribution, {} workers)",
            job.planned_files(),
            job.batches.len(),
            job.config.batch_size,
            job.config.distribution,
            job.config.pool_size
        );
        eprintln!();
    }

    fn on_file_completed(&self, batch_index: usize, file: &FileItem) {
        let done = self.files_done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.verbose {
            let status = match file.state {
                FileState::Done => "Done",
                FileState::Failed => "Failed",
                FileState::Pending => "Unknown",
            };
            eprintln!(
                "[{:3}] batch {}: {} {} -> {}",
                done,
                batch_index,
                status,
                Self::file_name(&file.source_path),
                file.destination_dir.display()
            );
        }
    }

    fn on_batch_completed(&self, report: &BatchReport) {
        if self.verbose {
            eprintln!(
                "Batch {} finished: {} copied, {} failed in {}",
                report.batch_index,
                report.copied(),
                report.failed(),
                Self::format_duration(report.elapsed)
            );
        }
    }

    fn on_job_completed(&self, summary: &JobSummary) {
        eprintln!();
        if summary.drained {
            eprintln!("Copy complete!");
        } else {
            eprintln!(
                "Timeout reached: {} of {} batches reported, the rest are still copying",
                summary.batches_completed, summary.batches_planned
            );
        }

        eprintln!(
            "Summary: {} copied, {} failed, {} planned",
            summary.files_copied, summary.files_failed, summary.files_planned
        );
        eprintln!("Bytes copied: {}", Self::format_bytes(summary.bytes_copied));
        if summary.cleanup.failed > 0 {
            eprintln!(
                "Cleanup: {} removed, {} could not be removed",
                summary.cleanup.removed, summary.cleanup.failed
            );
        }
        let elapsed = (summary.finished_at - summary.started_at)
            .to_std()
            .unwrap_or_default();
        eprintln!("Elapsed: {}", Self::format_duration(elapsed));

        for dest in &summary.destinations {
            match dest.entries {
                Some(n) => eprintln!("Directory {} has {} files", dest.path.display(), n),
                None => eprintln!("Directory {} could not be listed", dest.path.display()),
            }
        }

        if !summary.failures.is_empty() {
            eprintln!();
            eprintln!("Failed files:");
            for failure in &summary.failures {
                eprintln!(
                    "  {} -> {}: {}",
                    Self::file_name(&failure.source_path),
                    failure.destination_dir.display(),
                    failure.message
                );
            }
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse arguments, run the job and exit with its status
fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let result = run_cli(&args);
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    std::process::exit(exit_code(&result));
}

fn exit_code(result: &Result<JobSummary>) -> i32 {
    match result {
        Ok(summary) if summary.is_complete_success() => 0,
        Ok(_) => 1,
        Err(_) => 2,
    }
}

fn load_config(path: &Path) -> Result<JobConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

fn parse_distribution(value: &str) -> Result<Distribution> {
    match value.to_lowercase().as_str() {
        "per-batch" | "batch" => Ok(Distribution::PerBatch),
        "continuous" | "global" => Ok(Distribution::Continuous),
        _ => bail!(
            "Invalid distribution '{}'. Must be 'per-batch' or 'continuous'",
            value
        ),
    }
}

fn parse_source_order(value: &str) -> Result<SourceOrder> {
    match value.to_lowercase().as_str() {
        "filesystem" | "fs" => Ok(SourceOrder::Filesystem),
        "name" => Ok(SourceOrder::Name),
        _ => bail!(
            "Invalid source order '{}'. Must be 'filesystem' or 'name'",
            value
        ),
    }
}

/// Merge the optional config file with the command-line flags.
fn build_config(args: &Args) -> Result<JobConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => JobConfig::default(),
    };

    if let Some(source) = &args.source {
        config.source_path = source.clone();
    }
    if !args.destination.is_empty() {
        config.destination_paths = args.destination.clone();
    }
    if let Some(count) = args.count {
        config.count_copy_files = count;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(distribution) = &args.distribution {
        config.distribution = parse_distribution(distribution)?;
    }
    if let Some(order) = &args.source_order {
        config.source_order = parse_source_order(order)?;
    }
    if let Some(timeout) = args.shutdown_timeout_ms {
        config.shutdown_timeout_ms = timeout;
    }

    Ok(config)
}

/// Main CLI logic - separated for testability
///
/// Returns only after every batch has ended, including batches that
/// outlived the shutdown timeout, so exiting never cuts a copy short.
fn run_cli(args: &Args) -> Result<JobSummary> {
    let config = build_config(args)?;

    let progress: Option<Arc<dyn ProgressCallback>> = if args.json {
        None
    } else {
        Some(Arc::new(CliProgress::new(args.verbose)))
    };

    let mut job = create_job(&config).context("Copy job could not run")?;
    plan_job(&mut job).context("Copy job could not run")?;
    let summary = run_job(&mut job, Arc::new(FsCopier), progress).context("Copy job could not run")?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to encode summary")?;
        println!("{}", json);
    }

    if !job.detached.is_empty() {
        if !args.json {
            eprintln!("Waiting for the remaining batches to finish...");
        }
        job.wait_for_detached();
        if !args.json {
            eprintln!("Remaining batches finished");
        }
    }

    Ok(summary)
}
