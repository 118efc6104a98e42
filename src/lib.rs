//! # zkresource
//!
//! **zkresource** keeps typed values derived from a watched hierarchical namespace
//! (ZooKeeper-style paths) cached in memory and rebuilt whenever the underlying nodes
//! change.
//!
//! Readers always get the last successfully built value as an `Arc<T>`, without
//! blocking. A failed rebuild never replaces a good value; failure listeners are told
//! instead. Values displaced by a rebuild can be handed to a retirement task that waits
//! until consumers have released them.
//!
//! ## Architecture
//! ```text
//!   ┌──────────────────────────────┐
//!   │  Watcher (ZK cache, memory)  │
//!   └──────┬───────────────▲───────┘
//!          │ WatchEvent    │ current_data / descendants
//!          ▼               │
//! ┌────────────────────────┴─────────────────────────────────────────┐
//! │  CachedResource / TreeResource                                   │
//! │  - RefreshStrategy (inline or executor)                          │
//! │  - Pipeline (factory under catch_unwind, failure listeners)      │
//! │  - Slot (ArcSwapOption + swap lock)                              │
//! │  - Retirer (one tokio task per displaced value)                  │
//! └──────┬───────────────────────────────────────────────────────────┘
//!        │ publish(Event)
//!        ▼
//! ┌──────────────────────────────┐      ┌────────────────────────────┐
//! │  Bus (broadcast channel)     ├─────►│ forwarder ─► SubscriberSet │
//! └──────────────┬───────────────┘      └────────────────────────────┘
//!                └──► events() receivers
//! ```
//!
//! ### Lifecycle
//! ```text
//! build() ─► idle ─► first get() ─► subscribe + materialize ─► live
//!
//! live:
//!   ├─ Created/Updated ─► rebuild ─┬─ Ok  ─► swap, retire old
//!   │                              └─ Err ─► keep old, BuildFailed, listeners
//!   ├─ Deleted         ─► reset to empty value, retire old
//!   └─ close() (tree)  ─► closed: get() fails, events ignored
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Resources**     | Cached node and subtree values.                          | [`CachedResource`], [`TreeResource`]        |
//! | **Builders**      | Validated, immutable configuration.                      | [`ResourceBuilder`], [`TreeResourceBuilder`]|
//! | **Refresh**       | Inline or executor-bound rebuilds.                       | [`RefreshStrategy`], [`Executor`]           |
//! | **Retirement**    | Release displaced values once unused.                    | [`RetirementPolicy`], [`BackoffPolicy`]     |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).   | [`Subscribe`], [`Event`]                    |
//! | **Watcher**       | Namespace seam and an in-process implementation.         | [`watcher::Watcher`], [`watcher::MemoryWatcher`] |
//! | **Errors**        | Typed configuration and lifecycle errors.                | [`ResourceError`], [`BuildError`]           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use zkresource::watcher::{MemoryWatcher, TreeSnapshot};
//! use zkresource::{BuildError, TreeResource};
//!
//! let zk = Arc::new(MemoryWatcher::new());
//! zk.set("/services/a", "10.0.0.1");
//!
//! let hosts = TreeResource::<Vec<String>>::builder()
//!     .with_path("/services")
//!     .with_watcher(zk.clone())
//!     .with_factory(|snap: &TreeSnapshot| -> Result<Vec<String>, BuildError> {
//!         snap.values()
//!             .map(|v| std::str::from_utf8(v).map(str::to_string).map_err(BuildError::from))
//!             .collect()
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(*hosts.get().unwrap().unwrap(), vec!["10.0.0.1".to_string()]);
//! zk.set("/services/b", "10.0.0.2");
//! assert_eq!(hosts.get().unwrap().unwrap().len(), 2);
//!
//! hosts.close();
//! assert!(hosts.get().is_err());
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod refresh;
mod subscribers;
pub mod watcher;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    CachedResource, FailureListener, ResourceBuilder, RetirePredicate, RetirementPolicy,
    TreeResource, TreeResourceBuilder,
};
pub use error::{BuildError, ResourceError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use refresh::{Executor, Job, RefreshStrategy};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
