//! Reconnect delay computation.
//!
//! The policy is pure and deterministic: `delay(attempt) = factor ^ attempt`
//! seconds, with no jitter and no cap other than the attempt ceiling. A
//! server may override the computed value by putting `delay=<secs>` into the
//! close reason.

use std::time::Duration;

/// Default base for exponential growth.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

const DELAY_HINT: &str = "delay=";

/// Exponential backoff policy.
///
/// A factor of `2.0` yields 1s, 2s, 4s, 8s, ...; a factor of `1.0`
/// degenerates to a constant one second retry interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl BackoffPolicy {
    /// Create a policy with a custom growth factor.
    #[must_use]
    pub const fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Doubling backoff: 1s, 2s, 4s, ...
    #[must_use]
    pub const fn exponential() -> Self {
        Self::new(DEFAULT_BACKOFF_FACTOR)
    }

    /// Constant one second retry interval.
    #[must_use]
    pub const fn constant() -> Self {
        Self::new(1.0)
    }

    /// The growth factor.
    #[must_use]
    pub const fn factor(&self) -> f64 {
        self.factor
    }

    /// Computed delay before reconnect number `attempt + 1`.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(if secs.is_nan() || secs < 0.0 {
            Duration::ZERO
        } else {
            Duration::MAX
        })
    }

    /// Delay for the given attempt, honoring a `delay=<secs>` hint in the
    /// close reason when one is present.
    #[must_use]
    pub fn next_delay(&self, attempt: u32, reason: &str) -> Duration {
        match parse_delay_hint(reason) {
            Some(secs) => Duration::from_secs(secs),
            None => self.delay(attempt),
        }
    }
}

/// Extract the first `delay=<digits>` hint from a close reason.
///
/// The hint may appear anywhere in the reason. Occurrences of `delay=` that
/// are not followed by a digit are skipped. Values too large for `u64`
/// saturate.
#[must_use]
pub fn parse_delay_hint(reason: &str) -> Option<u64> {
    reason.match_indices(DELAY_HINT).find_map(|(idx, _)| {
        let rest = &reason[idx + DELAY_HINT.len()..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let digits = &rest[..end];
        if digits.is_empty() {
            None
        } else {
            Some(digits.parse().unwrap_or(u64::MAX))
        }
    })
}
