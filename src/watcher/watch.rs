//! # Watcher collaborator.
//!
//! [`Watcher`] is the seam between cached resources and whatever tracks the remote
//! namespace (a ZooKeeper path cache, an etcd watch stream, or the in-process
//! [`MemoryWatcher`](crate::watcher::MemoryWatcher)).
//!
//! ## Delivery contract
//! - Events for a subscribed path **and everything beneath it** are delivered.
//! - Delivery is eventual and at-least-once; there is no ordering guarantee against
//!   concurrent reads of [`Watcher::current_data`].
//! - Listeners may be invoked from any thread; they must not block for long unless the
//!   resource was configured to rebuild inline.

use std::fmt;
use std::sync::Arc;

use crate::watcher::record::{RawRecord, TreeSnapshot, WatchEvent};

/// Opaque handle of a listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receives change notifications from a [`Watcher`].
pub trait WatchListener: Send + Sync + 'static {
    /// Handles one event. Called on the watcher's notification thread.
    fn on_event(&self, event: &WatchEvent);
}

impl<F> WatchListener for F
where
    F: Fn(&WatchEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &WatchEvent) {
        self(event)
    }
}

/// Remote-namespace watcher consumed by cached resources.
///
/// The watcher outlives the resources built on it; resources only register and
/// unregister listeners.
pub trait Watcher: Send + Sync + 'static {
    /// Returns the current state of `path`, or `None` if the node does not exist.
    fn current_data(&self, path: &str) -> Option<RawRecord>;

    /// Returns every node strictly below `path` with its payload.
    fn descendants(&self, path: &str) -> TreeSnapshot;

    /// Registers `listener` for changes to `path` and all of its descendants.
    fn subscribe(&self, path: &str, listener: Arc<dyn WatchListener>) -> SubscriptionId;

    /// Removes a registration. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
