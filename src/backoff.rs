//! Backoff shapes for the resilience pipeline.
//!
//! Retry indices are 1-based: the first retry after a failed initial attempt
//! asks for `delay(1)`. Index `0` is the initial call and always yields zero.
//! Delays saturate at `MAX_BACKOFF` instead of overflowing.

use std::time::Duration;

/// Ceiling applied when a delay computation would overflow (1 hour).
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Delay progression between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant {
        /// The fixed delay.
        delay: Duration,
    },
    /// `base * n` before retry `n`.
    Linear {
        /// Delay added per retry.
        base: Duration,
    },
    /// `base * 2^(n-1)` before retry `n`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
    },
}

impl Backoff {
    /// Constant delay shape.
    pub fn constant(delay: Duration) -> Self {
        Self::Constant { delay }
    }

    /// Linear delay shape.
    pub fn linear(base: Duration) -> Self {
        Self::Linear { base }
    }

    /// Exponential (doubling) delay shape.
    pub fn exponential(base: Duration) -> Self {
        Self::Exponential { base }
    }

    /// Delay before retry `attempt` (1-based). Attempt `0` is the initial
    /// call and gets no delay.
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let computed = match self {
            Self::Constant { delay } => *delay,
            Self::Linear { base } => {
                let n = u32::try_from(attempt).unwrap_or(u32::MAX);
                base.checked_mul(n).unwrap_or(MAX_BACKOFF)
            }
            Self::Exponential { base } => {
                let exponent = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
                let multiplier = 2u128.saturating_pow(exponent);
                let nanos = base.as_nanos().saturating_mul(multiplier);
                Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64)
            }
        };
        computed.min(MAX_BACKOFF)
    }
}
