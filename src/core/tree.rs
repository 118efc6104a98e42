//! # Cached subtree resource.
//!
//! [`TreeResource`] builds one typed value from every node strictly below a root path
//! and rebuilds it from a fresh [`TreeSnapshot`] whenever anything in the subtree
//! changes.
//!
//! ```text
//! get() ─► closed? ─► Err(Closed)
//!            └─► materialize once ─► descendants(root) ─► build ─► install
//!
//! watch event strictly below root
//!   └─► closed? skip ─► strategy.dispatch(descendants(root) ─► build ─► install)
//!
//! close() ─► closed = true ─► unsubscribe ─► ResourceClosed ─► stop forwarder
//! ```
//!
//! Closing is terminal and idempotent. Rebuilds and retirements already running are
//! left to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::builder::{Assembly, TreeResourceBuilder};
use crate::core::pipeline::Pipeline;
use crate::core::slot::Slot;
use crate::error::ResourceError;
use crate::events::{Bus, Event, EventKind};
use crate::refresh::RefreshStrategy;
use crate::watcher::{
    is_descendant, SubscriptionId, TreeSnapshot, WatchEvent, WatchListener, Watcher,
};

/// A typed value derived from a whole subtree.
///
/// Clones share the cache; closing any clone closes them all.
pub struct TreeResource<T> {
    inner: Arc<TreeInner<T>>,
}

impl<T> Clone for TreeResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct TreeInner<T> {
    path: Arc<str>,
    watcher: Arc<dyn Watcher>,
    empty: Option<Arc<T>>,
    initial: Pipeline<TreeSnapshot, T>,
    refresh: Pipeline<TreeSnapshot, T>,
    strategy: RefreshStrategy,
    slot: Slot<T>,
    bus: Bus,
    init_lock: Mutex<()>,
    initialized: AtomicBool,
    closed: AtomicBool,
    subscription: Mutex<Option<SubscriptionId>>,
    forwarder: Option<CancellationToken>,
}

struct TreeListener<T> {
    inner: Weak<TreeInner<T>>,
}

impl<T: Send + Sync + 'static> WatchListener for TreeListener<T> {
    fn on_event(&self, event: &WatchEvent) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_event(event);
        }
    }
}

impl<T: Send + Sync + 'static> TreeResource<T> {
    /// Starts a [`TreeResourceBuilder`].
    pub fn builder() -> TreeResourceBuilder<T> {
        TreeResourceBuilder::new()
    }

    pub(crate) fn from_assembly(a: Assembly<TreeSnapshot, T>) -> Self {
        Self {
            inner: Arc::new(TreeInner {
                path: a.path,
                watcher: a.watcher,
                empty: a.empty,
                initial: a.initial,
                refresh: a.refresh,
                strategy: a.strategy,
                slot: a.slot,
                bus: a.bus,
                init_lock: Mutex::new(()),
                initialized: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                subscription: Mutex::new(None),
                forwarder: a.forwarder,
            }),
        }
    }

    /// Returns the live value, materializing it on the first call.
    ///
    /// # Errors
    /// [`ResourceError::Closed`] once [`close`](Self::close) has been called.
    pub fn get(&self) -> Result<Option<Arc<T>>, ResourceError> {
        self.inner.ensure_open()?;
        self.inner.materialize();
        self.inner.ensure_open()?;
        Ok(self.inner.slot.load().or_else(|| self.inner.empty.clone()))
    }

    /// Subtree root.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Receiver of this resource's lifecycle events, from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// `true` after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes the resource. Further calls are no-ops.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl<T: Send + Sync + 'static> TreeInner<T> {
    fn ensure_open(&self) -> Result<(), ResourceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ResourceError::Closed {
                path: self.path.to_string(),
            });
        }
        Ok(())
    }

    fn materialize(self: &Arc<Self>) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.init_lock.lock();
        if self.initialized.load(Ordering::Acquire) || self.closed.load(Ordering::Acquire) {
            return;
        }

        let listener = Arc::new(TreeListener {
            inner: Arc::downgrade(self),
        });
        let id = self.watcher.subscribe(&self.path, listener);
        *self.subscription.lock() = Some(id);
        debug!(path = %self.path, subscription = %id, "tree resource subscribed");

        self.slot.initialize(|| {
            let snapshot = self.watcher.descendants(&self.path);
            self.initial.build(&snapshot, None).map(|v| (v, None))
        });
        self.initialized.store(true, Ordering::Release);
    }

    fn on_event(self: &Arc<Self>, event: &WatchEvent) {
        if !is_descendant(&self.path, event.path()) || self.closed.load(Ordering::Acquire) {
            return;
        }
        if self.strategy.is_async() {
            self.bus
                .publish(Event::new(EventKind::RefreshScheduled).with_path(Arc::clone(&self.path)));
        }
        let inner = Arc::clone(self);
        self.strategy.dispatch(Box::new(move || inner.rebuild()));
    }

    fn rebuild(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let snapshot = self.watcher.descendants(&self.path);
        if let Some(value) = self.refresh.build(&snapshot, None) {
            self.slot.install(value, None);
        }
    }

    fn close(&self) {
        let _guard = self.init_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(id) = self.subscription.lock().take() {
            self.watcher.unsubscribe(id);
        }
        self.bus
            .publish(Event::new(EventKind::ResourceClosed).with_path(Arc::clone(&self.path)));
        info!(path = %self.path, "tree resource closed");
        if let Some(token) = &self.forwarder {
            token.cancel();
        }
    }
}

impl<T> Drop for TreeInner<T> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get_mut().take() {
            self.watcher.unsubscribe(id);
        }
        if let Some(token) = &self.forwarder {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::watcher::MemoryWatcher;
    use std::sync::atomic::AtomicUsize;

    fn child_count(zk: &Arc<MemoryWatcher>, calls: &Arc<AtomicUsize>) -> TreeResource<usize> {
        let c = Arc::clone(calls);
        TreeResource::<usize>::builder()
            .with_path("/svc")
            .with_watcher(zk.clone())
            .with_factory(move |snap: &TreeSnapshot| -> Result<usize, BuildError> {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(snap.len())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn empty_subtree_is_still_built() {
        let zk = Arc::new(MemoryWatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = child_count(&zk, &calls);
        assert_eq!(tree.get().unwrap().as_deref(), Some(&0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn add_update_remove_rebuild() {
        let zk = Arc::new(MemoryWatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = child_count(&zk, &calls);
        tree.get().unwrap();

        zk.set("/svc/a", "1");
        assert_eq!(tree.get().unwrap().as_deref(), Some(&1));
        zk.set("/svc/b/c", "2");
        assert_eq!(tree.get().unwrap().as_deref(), Some(&3));
        zk.set("/svc/a", "updated");
        assert_eq!(tree.get().unwrap().as_deref(), Some(&3));
        zk.delete("/svc/b");
        assert_eq!(tree.get().unwrap().as_deref(), Some(&1));
    }

    #[test]
    fn snapshot_keys_are_full_paths() {
        let zk = Arc::new(MemoryWatcher::new());
        zk.set("/svc", "root data");
        zk.set("/svc/a", "1");
        zk.create_empty("/svc/b");
        let tree = TreeResource::<Vec<(String, usize)>>::builder()
            .with_path("/svc")
            .with_watcher(zk.clone())
            .with_factory(|snap: &TreeSnapshot| -> Result<Vec<(String, usize)>, BuildError> {
                Ok(snap.iter().map(|(k, v)| (k.clone(), v.len())).collect())
            })
            .build()
            .unwrap();
        assert_eq!(
            *tree.get().unwrap().unwrap(),
            vec![("/svc/a".to_string(), 1), ("/svc/b".to_string(), 0)]
        );
    }

    #[test]
    fn close_is_idempotent_and_terminal() {
        let zk = Arc::new(MemoryWatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = child_count(&zk, &calls);
        let mut events = tree.events();
        tree.get().unwrap();
        assert_eq!(zk.listener_count(), 1);

        tree.close();
        tree.close();
        assert!(tree.is_closed());
        assert_eq!(zk.listener_count(), 0);

        let err = tree.get().unwrap_err();
        assert_eq!(err, ResourceError::Closed { path: "/svc".into() });

        zk.set("/svc/a", "1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let closed: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| e.kind == EventKind::ResourceClosed)
            .collect();
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn close_before_first_get_never_subscribes() {
        let zk = Arc::new(MemoryWatcher::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = child_count(&zk, &calls);
        tree.close();
        assert!(tree.get().unwrap_err().is_closed());
        assert_eq!(zk.listener_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_rebuild_keeps_previous_tree() {
        let zk = Arc::new(MemoryWatcher::new());
        let failures = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&failures);
        let tree = TreeResource::<usize>::builder()
            .with_path("/svc")
            .with_watcher(zk.clone())
            .with_factory(|snap: &TreeSnapshot| -> Result<usize, BuildError> {
                if snap.values().any(|v| v[..] == b"bad"[..]) {
                    return Err("bad child".into());
                }
                Ok(snap.len())
            })
            .add_failure_listener(move |_: &TreeSnapshot, _: &BuildError| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        zk.set("/svc/a", "ok");
        assert_eq!(tree.get().unwrap().as_deref(), Some(&1));
        zk.set("/svc/b", "bad");
        assert_eq!(tree.get().unwrap().as_deref(), Some(&1));
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }
}
