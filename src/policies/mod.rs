//! Retirement wait policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long a retirement loop waits between probes (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so simultaneous retirements do not probe in lock-step
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 1s, no jitter.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
