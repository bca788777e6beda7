//! Concurrent partition execution
//!
//! A bounded set of tokio tasks processes partitions in parallel. At most
//! `max_concurrent_tasks` are in flight; submission blocks on a semaphore
//! once the cap is reached. Worker results multiplex onto a single bounded
//! output channel. The first error observed is stored in a mutex-guarded
//! slot and flips an abort flag: later submissions are dropped at the
//! submission suspension point, outstanding tasks are cancelled best-effort
//! at shutdown, and the stored error is re-raised exactly once.
//!
//! Ordering: a worker sends its own results in order, so records within one
//! partition preserve page order. No ordering holds across partitions.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default cap on in-flight partition tasks. Deployments typically
/// configure far lower values.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 10_000;

/// Configuration for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum number of partition tasks in flight
    pub max_concurrent_tasks: usize,
    /// Capacity of the multiplexed output channel
    pub output_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            output_buffer: 1024,
        }
    }
}

impl CoordinatorConfig {
    /// Create a config with the given concurrency cap
    pub fn with_cap(max_concurrent_tasks: usize) -> Self {
        Self {
            max_concurrent_tasks,
            ..Default::default()
        }
    }
}

/// Coordinates bounded, failure-aware execution of partition tasks.
///
/// `T` is the output item type workers send through [`sender`].
///
/// [`sender`]: PartitionCoordinator::sender
pub struct PartitionCoordinator<T> {
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    tx: mpsc::Sender<T>,
    first_error: Arc<Mutex<Option<Error>>>,
    aborted: Arc<AtomicBool>,
    submitted: AtomicUsize,
    completed: Arc<AtomicUsize>,
}

impl<T: Send + 'static> PartitionCoordinator<T> {
    /// Create a coordinator and the receiving end of its output channel
    pub fn new(config: CoordinatorConfig) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(config.output_buffer.max(1));
        let coordinator = Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            tx,
            first_error: Arc::new(Mutex::new(None)),
            aborted: Arc::new(AtomicBool::new(false)),
            submitted: AtomicUsize::new(0),
            completed: Arc::new(AtomicUsize::new(0)),
        };
        (coordinator, rx)
    }

    /// A sender for the multiplexed output channel
    pub fn sender(&self) -> mpsc::Sender<T> {
        self.tx.clone()
    }

    /// Whether a worker has already failed
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Submit one partition task.
    ///
    /// Blocks while the in-flight count is at the cap (backpressure). Once
    /// a failure has been observed the work is dropped without running;
    /// the error surfaces from [`check_for_errors_and_shutdown`].
    ///
    /// [`check_for_errors_and_shutdown`]: PartitionCoordinator::check_for_errors_and_shutdown
    pub async fn submit<F>(&self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.is_aborted() {
            debug!("Coordinator aborted; dropping submitted partition task");
            return;
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("coordinator semaphore closed");

        // The failure may have landed while we waited for a permit.
        if self.is_aborted() {
            return;
        }

        self.submitted.fetch_add(1, Ordering::SeqCst);

        let first_error = Arc::clone(&self.first_error);
        let aborted = Arc::clone(&self.aborted);
        let completed = Arc::clone(&self.completed);

        self.tasks.lock().await.spawn(async move {
            let result = work.await;
            completed.fetch_add(1, Ordering::SeqCst);
            drop(permit);

            if let Err(err) = result {
                warn!("Partition task failed: {err}");
                let mut slot = first_error.lock().await;
                if slot.is_none() {
                    *slot = Some(err);
                }
                aborted.store(true, Ordering::SeqCst);
            }
        });
    }

    /// Drain the pool and surface the first failure, if any.
    ///
    /// On the failure path, not-yet-finished tasks are cancelled
    /// best-effort and the stored error is returned (exactly once, since
    /// this consumes the coordinator). On the success path every submitted
    /// task must have reported done; anything else is a coordinator fault.
    pub async fn check_for_errors_and_shutdown(self) -> Result<()> {
        let mut tasks = self.tasks.into_inner();

        if self.aborted.load(Ordering::SeqCst) {
            tasks.abort_all();
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    let mut slot = self.first_error.lock().await;
                    if slot.is_none() {
                        *slot = Some(Error::coordinator(format!("worker panicked: {err}")));
                    }
                }
            }
        }

        // Close the output channel so the drain side terminates.
        drop(self.tx);

        let mut slot = self.first_error.lock().await;
        if let Some(err) = slot.take() {
            return Err(err);
        }

        let submitted = self.submitted.load(Ordering::SeqCst);
        let completed = self.completed.load(Ordering::SeqCst);
        if submitted != completed {
            return Err(Error::coordinator(format!(
                "{} of {submitted} partition tasks never reported done",
                submitted - completed
            )));
        }

        Ok(())
    }
}

impl<T> std::fmt::Debug for PartitionCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionCoordinator")
            .field("submitted", &self.submitted.load(Ordering::SeqCst))
            .field("completed", &self.completed.load(Ordering::SeqCst))
            .field("aborted", &self.aborted.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
