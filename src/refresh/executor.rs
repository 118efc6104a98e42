//! # Executor collaborator.
//!
//! An [`Executor`] accepts a zero-argument unit of work and returns a completion
//! handle. Resources use it to run change-driven rebuilds off the notification thread.
//!
//! Factories are synchronous and may do blocking I/O (open a connection pool, read
//! a file), so the [`Handle`] implementation runs jobs on tokio's blocking pool.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs independently of the submitting thread.
pub trait Executor: Send + Sync + 'static {
    /// Submits `job`; the returned handle completes when the job has run.
    fn submit(&self, job: Job) -> JoinHandle<()>;
}

impl Executor for Handle {
    fn submit(&self, job: Job) -> JoinHandle<()> {
        self.spawn_blocking(job)
    }
}
