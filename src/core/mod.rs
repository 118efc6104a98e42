//! Resource core: construction, publication and retirement.
//!
//! The public API from this module is [`CachedResource`], [`TreeResource`] and their
//! builders. Everything else is shared plumbing.
//!
//! Internal modules:
//! - [`pipeline`]: runs a factory under panic isolation and notifies failure listeners;
//! - [`slot`]: the published value and its swap lock;
//! - [`retire`]: hands displaced values to retirement tasks;
//! - [`node`]: single-node resource;
//! - [`tree`]: subtree resource with a terminal closed state;
//! - [`builder`]: validates options and assembles both resource kinds.

mod builder;
mod node;
mod pipeline;
mod retire;
mod slot;
mod tree;

pub use builder::{ResourceBuilder, TreeResourceBuilder};
pub use node::CachedResource;
pub use pipeline::FailureListener;
pub use retire::{RetirePredicate, RetirementPolicy};
pub use tree::TreeResource;
