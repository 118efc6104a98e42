//! # Lifecycle events emitted by cached resources.
//!
//! [`EventKind`] classifies what happened to a resource:
//! - **Build events**: a value was built, a build failed, the value was reset to empty
//! - **Retirement events**: a displaced instance was scheduled, deferred, or released
//! - **Terminal events**: the resource was closed
//! - **Isolation events**: a failure listener or subscriber panicked, a subscriber overflowed
//!
//! [`Event`] carries the metadata (path, reason, attempt, delay, data version).
//!
//! ## Ordering guarantees
//! Every event takes a process-wide monotonic sequence number (`seq`). Use it to
//! restore order when events from several resources are merged.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use zkresource::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetirementDeferred)
//!     .with_path("/app/db")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::RetirementDeferred);
//! assert_eq!(ev.path.as_deref(), Some("/app/db"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of resource lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Build events ===
    /// A new value was built and published.
    ///
    /// Sets `path`, `version` (data version when known).
    ResourceBuilt,

    /// The factory failed; the previous value stays live.
    ///
    /// Sets `path`, `reason` (factory error), `version` (when known).
    BuildFailed,

    /// The monitored node was deleted; the value fell back to empty.
    ///
    /// Sets `path`.
    ResourceReset,

    /// A rebuild was handed to the refresh executor.
    ///
    /// Sets `path`.
    RefreshScheduled,

    // === Retirement events ===
    /// A displaced instance entered its retirement loop.
    ///
    /// Sets `path`.
    RetirementScheduled,

    /// The retirement predicate refused (or panicked); another probe follows.
    ///
    /// Sets `path`, `attempt`, `delay_ms` (wait before the next probe), `reason` (panic only).
    RetirementDeferred,

    /// The retirement predicate accepted; the instance is released.
    ///
    /// Sets `path`, `attempt`.
    ResourceRetired,

    // === Terminal events ===
    /// The resource was closed and detached from its watcher.
    ///
    /// Sets `path`.
    ResourceClosed,

    // === Isolation events ===
    /// A failure listener panicked. Remaining listeners still ran.
    ///
    /// Sets `path`, `reason` (panic message).
    ListenerPanicked,

    /// A subscriber panicked while handling an event.
    ///
    /// Sets `subscriber`, `reason`.
    SubscriberPanicked,

    /// A subscriber queue was full or closed; the event was dropped for it.
    ///
    /// Sets `subscriber`, `reason`.
    SubscriberOverflow,
}

/// Lifecycle event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Monitored path of the resource, if applicable.
    pub path: Option<Arc<str>>,
    /// Subscriber name, for subscriber events.
    pub subscriber: Option<&'static str>,
    /// Human-readable reason (factory error, panic message, overflow cause).
    pub reason: Option<Arc<str>>,
    /// Retirement probe number (starting from 1).
    pub attempt: Option<u32>,
    /// Wait before the next retirement probe, in milliseconds.
    pub delay_ms: Option<u32>,
    /// Data version of the record involved, when the watcher reports one.
    pub version: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            path: None,
            subscriber: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            version: None,
        }
    }

    /// Attaches the resource path.
    #[inline]
    pub fn with_path(mut self, path: impl Into<Arc<str>>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a retirement probe number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a wait (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a data version, if any.
    #[inline]
    pub fn with_version(mut self, version: Option<u64>) -> Self {
        self.version = version;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }
}
