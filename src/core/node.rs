//! # Cached single-node resource.
//!
//! [`CachedResource`] turns the payload of one watched path into a typed value and keeps
//! it fresh as the node changes.
//!
//! ```text
//! get() ─► materialized? ──yes──────────────────────────────► load ─► value | empty
//!              └─no─► init lock ─► subscribe ─► current_data ─► build ─► install
//!
//! watch event (exact path)
//!   ├─ Created/Updated + data ─► strategy.dispatch(build(record) ─► install)
//!   └─ Deleted                ─► reset (previous value retired)
//! ```
//!
//! Build failures never reach callers: the previous value stays live and the failure
//! listeners are told instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::builder::{Assembly, ResourceBuilder};
use crate::core::pipeline::Pipeline;
use crate::core::slot::Slot;
use crate::events::{Bus, Event, EventKind};
use crate::refresh::RefreshStrategy;
use crate::watcher::{RawRecord, SubscriptionId, WatchEvent, WatchListener, Watcher};

/// A typed value derived from one watched node.
///
/// Cloning is cheap and clones share the same cache and subscription. The watcher
/// registration is removed when the last clone is dropped.
pub struct CachedResource<T> {
    inner: Arc<NodeInner<T>>,
}

impl<T> Clone for CachedResource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct NodeInner<T> {
    path: Arc<str>,
    watcher: Arc<dyn Watcher>,
    empty: Option<Arc<T>>,
    initial: Pipeline<RawRecord, T>,
    refresh: Pipeline<RawRecord, T>,
    strategy: RefreshStrategy,
    slot: Slot<T>,
    bus: Bus,
    init_lock: Mutex<()>,
    initialized: AtomicBool,
    subscription: Mutex<Option<SubscriptionId>>,
    forwarder: Option<CancellationToken>,
}

struct NodeListener<T> {
    inner: Weak<NodeInner<T>>,
}

impl<T: Send + Sync + 'static> WatchListener for NodeListener<T> {
    fn on_event(&self, event: &WatchEvent) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_event(event);
        }
    }
}

impl<T: Send + Sync + 'static> CachedResource<T> {
    /// Starts a [`ResourceBuilder`] for a node resource.
    pub fn builder() -> ResourceBuilder<T> {
        ResourceBuilder::new()
    }

    pub(crate) fn from_assembly(a: Assembly<RawRecord, T>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
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
                subscription: Mutex::new(None),
                forwarder: a.forwarder,
            }),
        }
    }

    /// Returns the live value, materializing it on the first call.
    ///
    /// Falls back to the empty value while the node has no data or no build has
    /// succeeded yet; `None` only when no empty value was configured.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.materialize();
        self.inner
            .slot
            .load()
            .or_else(|| self.inner.empty.clone())
    }

    /// Monitored path.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Receiver of this resource's lifecycle events, from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Re-reads the node from the watcher and rebuilds through the refresh strategy.
    ///
    /// A missing node resets the value, as a delete event would.
    pub fn refresh_now(&self) {
        self.inner.materialize();
        match self.inner.watcher.current_data(&self.inner.path) {
            Some(rec) if rec.has_data() => self.inner.schedule_refresh(rec),
            Some(_) => trace!(path = %self.inner.path, "node has no data, nothing to refresh"),
            None => {
                self.inner.slot.reset();
            }
        }
    }
}

impl<T: Send + Sync + 'static> NodeInner<T> {
    fn materialize(self: &Arc<Self>) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.init_lock.lock();
        if self.initialized.load(Ordering::Acquire) {
            return;
        }

        let listener = Arc::new(NodeListener {
            inner: Arc::downgrade(self),
        });
        let id = self.watcher.subscribe(&self.path, listener);
        *self.subscription.lock() = Some(id);
        debug!(path = %self.path, subscription = %id, "node resource subscribed");

        self.slot.initialize(|| {
            let rec = self.watcher.current_data(&self.path)?;
            if !rec.has_data() {
                return None;
            }
            let version = rec.stat.as_ref().map(|s| s.version);
            self.initial.build(&rec, version).map(|v| (v, version))
        });
        self.initialized.store(true, Ordering::Release);
    }

    fn on_event(self: &Arc<Self>, event: &WatchEvent) {
        if event.path() != &*self.path {
            return;
        }
        if !event.kind.carries_data() {
            self.slot.reset();
        } else if event.record.has_data() {
            self.schedule_refresh(event.record.clone());
        } else {
            trace!(path = %self.path, kind = ?event.kind, "event without data ignored");
        }
    }

    fn schedule_refresh(self: &Arc<Self>, rec: RawRecord) {
        let version = rec.stat.as_ref().map(|s| s.version);
        if self.strategy.is_async() {
            self.bus.publish(
                Event::new(EventKind::RefreshScheduled)
                    .with_path(Arc::clone(&self.path))
                    .with_version(version),
            );
        }
        let inner = Arc::clone(self);
        self.strategy.dispatch(Box::new(move || {
            if let Some(value) = inner.refresh.build(&rec, version) {
                inner.slot.install(value, version);
            }
        }));
    }
}

impl<T> Drop for NodeInner<T> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get_mut().take() {
            self.watcher.unsubscribe(id);
        }
        if let Some(token) = &self.forwarder {
            token.cancel();
        }
    }
}
