//! # Shared resource configuration.
//!
//! [`Config`] holds the knobs that are usually identical across all resources of an
//! application, so they can be built once and handed to every builder with
//! `with_config`.
//!
//! ## Sentinel values
//! - `retire_backoff.first = 0s` → retirement probes back-to-back (the loop yields between probes)

use crate::policies::BackoffPolicy;

/// Defaults shared by resource builders.
///
/// ## Field semantics
/// - `bus_capacity`: lifecycle event ring buffer size (min 1; clamped by the bus)
/// - `retire_backoff`: wait between retirement probes when a predicate is registered
///   without its own wait (`with_retirement_predicate`)
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each resource's lifecycle event channel.
    ///
    /// Receivers lagging more than `bus_capacity` events observe `Lagged` and skip ahead.
    pub bus_capacity: usize,

    /// Default wait policy for retirement loops.
    pub retire_backoff: BackoffPolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `retire_backoff = BackoffPolicy::default()` (constant 1s)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            retire_backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.bus_capacity_clamped(), 1024);
        assert_eq!(cfg.retire_backoff.next(0), Duration::from_secs(1));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
