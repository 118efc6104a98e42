//! # Swap slot: the single published value of a resource.
//!
//! Readers load the current `Arc` without locking. Writers take the slot's swap lock,
//! replace the reference, release the lock, and only then hand the displaced value to
//! the [`Retirer`]:
//!
//! ```text
//! install(new):   lock ─► old = swap(Some(new)) ─► unlock ─► ResourceBuilt ─► retire(old)
//! reset():        lock ─► old = swap(None)      ─► unlock ─► ResourceReset ─► retire(old)
//! initialize(f):  lock ─► f() (read + build)    ─► swap    ─► unlock ─► ...
//! ```
//!
//! Concurrent installs are serialized by the lock; the last one to take it wins.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::debug;

use crate::core::retire::Retirer;
use crate::events::{Bus, Event, EventKind};

pub(crate) struct Slot<T> {
    path: Arc<str>,
    current: ArcSwapOption<T>,
    swap_lock: Mutex<()>,
    retirer: Retirer<T>,
    bus: Bus,
}

impl<T: Send + Sync + 'static> Slot<T> {
    pub(crate) fn new(path: Arc<str>, retirer: Retirer<T>, bus: Bus) -> Self {
        Self {
            path,
            current: ArcSwapOption::empty(),
            swap_lock: Mutex::new(()),
            retirer,
            bus,
        }
    }

    /// Current value, `None` before the first successful build or after a reset.
    #[inline]
    pub(crate) fn load(&self) -> Option<Arc<T>> {
        self.current.load_full()
    }

    /// Publishes `value`, retiring whatever it displaced.
    pub(crate) fn install(&self, value: Arc<T>, version: Option<u64>) {
        let old = {
            let _guard = self.swap_lock.lock();
            self.current.swap(Some(value))
        };
        self.built(version);
        self.retire(old);
    }

    /// Runs `build` under the swap lock and publishes its result, if any.
    ///
    /// Used for first-time materialization, where reading the watcher snapshot and
    /// publishing must not interleave with a change-driven install.
    pub(crate) fn initialize<F>(&self, build: F)
    where
        F: FnOnce() -> Option<(Arc<T>, Option<u64>)>,
    {
        let (old, version) = {
            let _guard = self.swap_lock.lock();
            match build() {
                Some((value, version)) => (self.current.swap(Some(value)), version),
                None => return,
            }
        };
        self.built(version);
        self.retire(old);
    }

    /// Drops back to "no value", retiring the previous one. Returns `true` if a value was removed.
    pub(crate) fn reset(&self) -> bool {
        let old = {
            let _guard = self.swap_lock.lock();
            self.current.swap(None)
        };
        debug!(path = %self.path, had_value = old.is_some(), "resource reset to empty value");
        self.bus
            .publish(Event::new(EventKind::ResourceReset).with_path(Arc::clone(&self.path)));
        let removed = old.is_some();
        self.retire(old);
        removed
    }

    fn built(&self, version: Option<u64>) {
        debug!(path = %self.path, version = ?version, "resource built");
        self.bus.publish(
            Event::new(EventKind::ResourceBuilt)
                .with_path(Arc::clone(&self.path))
                .with_version(version),
        );
    }

    fn retire(&self, old: Option<Arc<T>>) {
        if let Some(old) = old {
            self.retirer.retire(old);
        }
    }
}
