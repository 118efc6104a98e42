//! Resource lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the build pipeline, the swap slot, retirement tasks, tree close,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: [`CachedResource::events`](crate::CachedResource::events) receivers and
//!   the per-resource forwarder feeding registered [`Subscribe`](crate::Subscribe) implementations.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
