//! # Refresh strategy.
//!
//! [`RefreshStrategy`] decides where a change-driven rebuild runs:
//!
//! ```text
//! watch event ──► Inline            ──► factory on the notification thread, then swap
//!             └─► Executor(exec)    ──► exec.submit(job) and return immediately
//!                                        └─► factory + swap on the executor
//! ```
//!
//! Inline keeps rebuilds in event order at the cost of blocking the notifier.
//! Executor keeps the notifier free; overlapping rebuilds may complete out of order and
//! the last swap wins.

use std::fmt;
use std::sync::Arc;

use crate::refresh::executor::{Executor, Job};

/// Where change-driven rebuilds run.
#[derive(Clone, Default)]
pub enum RefreshStrategy {
    /// Rebuild synchronously on the thread delivering the notification.
    #[default]
    Inline,
    /// Submit the rebuild to an executor.
    Executor(Arc<dyn Executor>),
}

impl RefreshStrategy {
    /// Builds an [`RefreshStrategy::Executor`] from any executor.
    pub fn executor(exec: impl Executor) -> Self {
        RefreshStrategy::Executor(Arc::new(exec))
    }

    /// `true` when rebuilds leave the notification thread.
    pub fn is_async(&self) -> bool {
        matches!(self, RefreshStrategy::Executor(_))
    }

    /// Runs `job` according to the strategy.
    pub(crate) fn dispatch(&self, job: Job) {
        match self {
            RefreshStrategy::Inline => job(),
            RefreshStrategy::Executor(exec) => {
                // Completion is observed through the resource itself, not the handle.
                drop(exec.submit(job));
            }
        }
    }
}

impl fmt::Debug for RefreshStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStrategy::Inline => f.write_str("Inline"),
            RefreshStrategy::Executor(_) => f.write_str("Executor(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn inline_runs_before_returning() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = Arc::clone(&ran);
        RefreshStrategy::Inline.dispatch(Box::new(move || r.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
        assert!(!RefreshStrategy::default().is_async());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn executor_runs_elsewhere() {
        let strategy = RefreshStrategy::executor(tokio::runtime::Handle::current());
        assert!(strategy.is_async());
        assert_eq!(format!("{strategy:?}"), "Executor(..)");

        let (tx, rx) = tokio::sync::oneshot::channel();
        let caller = std::thread::current().id();
        strategy.dispatch(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        let worker = rx.await.unwrap();
        assert_ne!(worker, caller);
    }
}
