//! # Event subscribers.
//!
//! ```text
//! Resource ── publish(Event) ──► Bus ──► forwarder ──► SubscriberSet
//!                                 │                        ├──► LogWriter
//!                                 │                        └──► custom ...
//!                                 └──► CachedResource::events() receivers
//! ```
//!
//! Register subscribers with `ResourceBuilder::with_subscribers`; they require a tokio
//! runtime (explicit via `with_runtime` or the ambient one at build time).

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::spawn_forwarder;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
