//! # Delay between failed start attempts.
//!
//! When a child dies before its start-confirmation delay elapses, the process
//! enters `backoff` and the core arms a retry timer. [`BackoffPolicy`] computes
//! that timer from the retry counter:
//!
//! ```text
//! delay(retry) = min(first × factor^(retry - 1), max)  → jitter
//! ```
//!
//! The base delay depends only on the retry number, so jitter never feeds back
//! into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(1), Duration::from_millis(100));
//! assert_eq!(backoff.next(2), Duration::from_millis(200));
//! assert_eq!(backoff.next(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry pacing for failed starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per retry (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 10s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A policy that retries immediately.
    pub fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay before retry number `retry` (1-based; `0` is treated as `1`).
    pub fn next(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
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

    fn policy(factor: f64, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(3),
            factor,
            jitter,
        }
    }

    #[test]
    fn first_retry_uses_first_delay() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(100));
    }

    #[test]
    fn grows_exponentially_until_capped() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.next(2), Duration::from_millis(200));
        assert_eq!(p.next(3), Duration::from_millis(400));
        assert_eq!(p.next(6), Duration::from_secs(3));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(3));
    }

    #[test]
    fn constant_factor_stays_flat() {
        let p = policy(1.0, JitterPolicy::None);
        for retry in 1..8 {
            assert_eq!(p.next(retry), Duration::from_millis(100), "retry {retry}");
        }
    }

    #[test]
    fn immediate_never_waits() {
        assert_eq!(BackoffPolicy::immediate().next(5), Duration::ZERO);
    }

    #[test]
    fn equal_jitter_stays_within_half_and_base() {
        let p = policy(2.0, JitterPolicy::Equal);
        for retry in 1..10 {
            let base = Duration::from_millis(100 * 2u64.pow(retry - 1)).min(Duration::from_secs(3));
            let delay = p.next(retry);
            assert!(delay >= base / 2, "retry {retry}: {delay:?} < {:?}", base / 2);
            assert!(delay <= base, "retry {retry}: {delay:?} > {base:?}");
        }
    }
}
