//! Fixed-size worker pool for copy tasks.
//!
//! Workers compete for tasks on one shared `crossbeam_channel` queue.
//! Shutdown closes the queue and waits, up to a deadline, for the workers to
//! finish what was already queued; tasks are never cancelled. Workers still
//! busy at the deadline are handed back as `DetachedWorkers` so the caller
//! can wait for them before the process exits.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::error::PoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[cfg(test)]
thread_local! {
    /// Makes the next `WorkerPool::new` on this thread fail to spawn.
    pub(crate) static FAIL_NEXT_SPAWN: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Workers that outlived the shutdown deadline.
///
/// They keep draining the queue on their own; `join` blocks until they are
/// done. Dropping this value leaves them running unattended.
#[derive(Debug, Default)]
pub struct DetachedWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl DetachedWorkers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every detached worker to exit. Returns how many were joined.
    pub fn join(self) -> usize {
        let count = self.handles.len();
        if count > 0 {
            info!(workers = count, "Waiting for detached workers");
        }
        for handle in self.handles {
            let _ = handle.join();
        }
        count
    }
}

/// Result of `WorkerPool::shutdown`.
#[derive(Debug)]
pub struct ShutdownOutcome {
    /// Every worker exited before the deadline
    pub drained: bool,
    pub waited: Duration,
    /// Empty when `drained` is true
    pub detached: DetachedWorkers,
}

/// A fixed set of named worker threads.
///
/// Dropping the pool closes its queue, so workers exit once the tasks
/// already queued are done, on every exit path.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    // Each worker holds a sender; disconnection means all workers exited.
    exited: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    ///
    /// # Errors
    /// Returns `PoolError::Spawn` if a thread cannot be started; workers
    /// already started are released.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        #[cfg(test)]
        if FAIL_NEXT_SPAWN.with(|fail| fail.replace(false)) {
            return Err(PoolError::Spawn(std::io::Error::new(
                std::io::ErrorKind::Other,
                "spawn disabled",
            )));
        }

        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let (exit_tx, exited) = bounded::<()>(0);

        let mut handles = Vec::with_capacity(size);
        for worker in 0..size {
            let rx = receiver.clone();
            let exit_guard = exit_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("copy-worker-{}", worker))
                .spawn(move || {
                    let _exit_guard = exit_guard;
                    for job in rx.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(worker, "Copy task panicked");
                        }
                    }
                    debug!(worker, "Worker exiting");
                })
                .map_err(PoolError::Spawn)?;
            handles.push(handle);
        }

        debug!(workers = size, "Worker pool started");
        Ok(WorkerPool {
            sender: Some(sender),
            exited,
            handles,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Queue a task without blocking.
    ///
    /// # Errors
    /// Returns `PoolError::Closed` if the pool no longer accepts work.
    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        sender.send(Box::new(task)).map_err(|_| PoolError::Closed)
    }

    /// Stop accepting tasks and wait up to `timeout` for the workers to
    /// finish. Workers still busy at the deadline keep running, including
    /// on tasks still queued, and are returned in `detached`.
    pub fn shutdown(mut self, timeout: Duration) -> ShutdownOutcome {
        drop(self.sender.take());
        let started = Instant::now();

        let drained = match started.checked_add(timeout) {
            Some(deadline) => matches!(
                self.exited.recv_deadline(deadline),
                Err(RecvTimeoutError::Disconnected)
            ),
            None => self.exited.recv().is_err(),
        };

        let handles = std::mem::take(&mut self.handles);
        let detached = if drained {
            for handle in handles {
                let _ = handle.join();
            }
            DetachedWorkers::default()
        } else {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Workers still busy after shutdown timeout, detaching"
            );
            DetachedWorkers { handles }
        };

        ShutdownOutcome {
            drained,
            waited: started.elapsed(),
            detached,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
    }
}
