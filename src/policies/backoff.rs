//! # Wait policy between retirement attempts.
//!
//! [`BackoffPolicy`] decides how long a retirement loop sleeps before probing its
//! predicate again. The wait before attempt `n` (0-indexed) is `first × factor^n`,
//! clamped to `max`, then jittered. The base is derived from the attempt number only,
//! so jitter never feeds back into later waits.
//!
//! `factor = 1.0` gives the plain "retry every `first`" behaviour; that is what
//! [`BackoffPolicy::constant`] builds and what the builder's `with_retirement` uses.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use zkresource::{BackoffPolicy, JitterPolicy};
//!
//! let wait = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(wait.next(0), Duration::from_millis(100));
//! assert_eq!(wait.next(1), Duration::from_millis(200));
//! assert_eq!(wait.next(10), Duration::from_secs(1));
//!
//! assert_eq!(BackoffPolicy::constant(Duration::from_millis(50)).next(7), Duration::from_millis(50));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retirement wait policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Wait before the first probe.
    pub first: Duration,
    /// Upper bound on any single wait.
    pub max: Duration,
    /// Multiplicative growth per attempt (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to each wait.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant one second between probes, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Fixed `period` between attempts. `Duration::ZERO` probes back-to-back.
    pub const fn constant(period: Duration) -> Self {
        Self {
            first: period,
            max: period,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Replaces the jitter policy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the wait before attempt `attempt` (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_never_grows() {
        let policy = BackoffPolicy::constant(Duration::from_millis(500));
        for attempt in 0..20 {
            assert_eq!(policy.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn zero_period_is_zero() {
        assert_eq!(BackoffPolicy::constant(Duration::ZERO).next(3), Duration::ZERO);
    }

    #[test]
    fn exponential_growth_is_capped() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(4), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn equal_jitter_keeps_half() {
        let policy =
            BackoffPolicy::constant(Duration::from_millis(800)).with_jitter(JitterPolicy::Equal);
        for attempt in 0..50 {
            let d = policy.next(attempt);
            assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(800));
        }
    }
}
