//! # Retirement: releasing displaced instances.
//!
//! When a swap displaces a value, consumers may still hold `Arc` clones of it (an open
//! connection pool, a client mid-request). The retirer hands the displaced instance to
//! a lightweight tokio task that probes a user predicate until it reports the instance
//! released.
//!
//! ## Loop
//! ```text
//! RetirementScheduled
//! loop {
//!   ├─► wait = backoff.next(attempt)     (yield instead when zero)
//!   ├─► sleep(wait)
//!   ├─► attempt += 1
//!   └─► predicate(&old)
//!         ├─ true   ─► ResourceRetired, info!, exit
//!         ├─ false  ─► RetirementDeferred, continue
//!         └─ panic  ─► RetirementDeferred{reason}, continue
//! }
//! ```
//!
//! ## Rules
//! - No policy → the displaced `Arc` is simply dropped.
//! - The loop is unbounded; the predicate owner must eventually return `true`.
//! - Each retirement is its own task; retirements never wait on each other.
//! - Closing a resource does not stop retirements already running.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;

/// Predicate deciding whether a displaced instance has been released.
pub type RetirePredicate<T> = Arc<dyn Fn(&Arc<T>) -> bool + Send + Sync>;

/// How displaced instances are released.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use zkresource::RetirementPolicy;
///
/// // Release once nobody but the retirer holds the instance.
/// let policy = RetirementPolicy::<String>::constant(
///     |old: &Arc<String>| Arc::strong_count(old) == 1,
///     Duration::from_millis(100),
/// );
/// assert_eq!(policy.wait().next(5), Duration::from_millis(100));
/// ```
pub struct RetirementPolicy<T> {
    predicate: RetirePredicate<T>,
    wait: BackoffPolicy,
}

impl<T> Clone for RetirementPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            wait: self.wait,
        }
    }
}

impl<T> RetirementPolicy<T> {
    /// Probes `predicate`, waiting according to `wait` before each probe.
    pub fn new<F>(predicate: F, wait: BackoffPolicy) -> Self
    where
        F: Fn(&Arc<T>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            wait,
        }
    }

    /// Probes `predicate` every `period`.
    pub fn constant<F>(predicate: F, period: Duration) -> Self
    where
        F: Fn(&Arc<T>) -> bool + Send + Sync + 'static,
    {
        Self::new(predicate, BackoffPolicy::constant(period))
    }

    pub(crate) fn from_parts(predicate: RetirePredicate<T>, wait: BackoffPolicy) -> Self {
        Self { predicate, wait }
    }

    pub(crate) fn into_parts(self) -> (RetirePredicate<T>, BackoffPolicy) {
        (self.predicate, self.wait)
    }

    /// Wait policy between probes.
    pub fn wait(&self) -> &BackoffPolicy {
        &self.wait
    }
}

/// Hands displaced instances to retirement tasks.
pub(crate) struct Retirer<T> {
    policy: Option<RetirementPolicy<T>>,
    rt: Option<Handle>,
    bus: Bus,
    path: Arc<str>,
}

impl<T: Send + Sync + 'static> Retirer<T> {
    /// `rt` must be `Some` whenever `policy` is; the builder enforces it.
    pub(crate) fn new(
        policy: Option<RetirementPolicy<T>>,
        rt: Option<Handle>,
        bus: Bus,
        path: Arc<str>,
    ) -> Self {
        Self {
            policy,
            rt,
            bus,
            path,
        }
    }

    /// Starts retiring `old`. Returns the task handle when a loop was spawned.
    pub(crate) fn retire(&self, old: Arc<T>) -> Option<JoinHandle<()>> {
        let (Some(policy), Some(rt)) = (&self.policy, &self.rt) else {
            return None;
        };
        self.bus.publish(Event::new(EventKind::RetirementScheduled).with_path(Arc::clone(&self.path)));
        debug!(path = %self.path, "retirement scheduled");
        Some(rt.spawn(retire_loop(
            old,
            policy.clone(),
            self.bus.clone(),
            Arc::clone(&self.path),
        )))
    }
}

async fn retire_loop<T: Send + Sync + 'static>(
    old: Arc<T>,
    policy: RetirementPolicy<T>,
    bus: Bus,
    path: Arc<str>,
) {
    let mut attempt: u32 = 0;
    loop {
        let wait = policy.wait.next(attempt);
        if wait.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(wait).await;
        }
        attempt = attempt.saturating_add(1);

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| (policy.predicate)(&old)));
        let next = policy.wait.next(attempt);
        match outcome {
            Ok(true) => {
                info!(path = %path, attempt, "successfully retired old resource");
                bus.publish(
                    Event::new(EventKind::ResourceRetired)
                        .with_path(path)
                        .with_attempt(attempt),
                );
                return;
            }
            Ok(false) => {
                bus.publish(
                    Event::new(EventKind::RetirementDeferred)
                        .with_path(Arc::clone(&path))
                        .with_attempt(attempt)
                        .with_delay(next),
                );
            }
            Err(panic) => {
                let info = panic_message(panic.as_ref());
                warn!(path = %path, attempt, info = %info, "retirement predicate panicked");
                bus.publish(
                    Event::new(EventKind::RetirementDeferred)
                        .with_path(Arc::clone(&path))
                        .with_attempt(attempt)
                        .with_delay(next)
                        .with_reason(info),
                );
            }
        }
    }
}
