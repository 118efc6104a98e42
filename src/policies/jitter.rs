//! # Jitter for retirement waits.
//!
//! When many instances are displaced at once (a burst of config writes), their
//! retirement loops would otherwise probe in lock-step. [`JitterPolicy`] spreads them.
//!
//! - [`JitterPolicy::None`]  exact wait
//! - [`JitterPolicy::Full`]  random in `[0, wait]`
//! - [`JitterPolicy::Equal`] `wait/2 + random[0, wait/2]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied to each retirement wait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the computed wait unchanged.
    #[default]
    None,
    /// Random wait in `[0, wait]`.
    Full,
    /// `wait/2` plus a random share of the other half.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 { 0 } else { rng.random_range(0..=half) };
                Duration::from_millis(half + extra)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(250);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn bounds_hold() {
        let d = Duration::from_millis(1000);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(d) <= d);
            let eq = JitterPolicy::Equal.apply(d);
            assert!(eq >= Duration::from_millis(500) && eq <= d);
        }
    }
}
