//! Where rebuilds run.
//!
//! - [`RefreshStrategy`] inline vs executor-bound refresh
//! - [`Executor`], [`Job`] executor collaborator (implemented for `tokio::runtime::Handle`)

mod executor;
mod strategy;

pub use executor::{Executor, Job};
pub use strategy::RefreshStrategy;
