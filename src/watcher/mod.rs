//! Watched namespace: records, events and the watcher seam.
//!
//! ## Contents
//! - [`RawRecord`], [`Stat`], [`WatchEvent`], [`WatchEventKind`] raw data model
//! - [`Watcher`], [`WatchListener`] collaborator traits consumed by resources
//! - [`MemoryWatcher`] in-process namespace implementing [`Watcher`]

mod memory;
mod record;
mod watch;

pub use memory::MemoryWatcher;
pub use record::{
    is_descendant, is_within, RawRecord, Stat, TreeSnapshot, WatchEvent, WatchEventKind,
};
pub use watch::{SubscriptionId, WatchListener, Watcher};
