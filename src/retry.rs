//! Pacing and capping of middleware-triggered retries.
//!
//! The pipeline never decides on its own to retry a request: only a
//! post-response middleware returning [`Decision::Retry`](crate::Decision::Retry)
//! does. The [`RetryStrategy`] decides how many such retries a logical call may
//! perform and how long to wait before each of them.

use rand::Rng;
use std::time::Duration;

/// Default number of retries a logical call may perform.
///
/// A call therefore makes at most two network sends.
pub const DEFAULT_MAX_RETRIES: usize = 1;

/// Defines how many middleware-requested retries are allowed and how they are paced.
///
/// # Examples
///
/// ```
/// use reqflow::RetryStrategy;
/// use std::time::Duration;
///
/// // Retry at once, once (the default)
/// let immediate = RetryStrategy::default();
/// assert_eq!(immediate.max_retries(), Some(1));
///
/// // Exponential backoff: 100ms, 200ms, 400ms...
/// let exponential = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(30),
///     max_retries: 3,
///     jitter: true,
/// };
///
/// // Linear backoff: 1s, 1s...
/// let linear = RetryStrategy::Linear {
///     delay: Duration::from_secs(1),
///     max_retries: 2,
/// };
/// ```
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Never retry; a middleware asking for a retry gets [`Error::MaxRetry`](crate::Error::MaxRetry).
    None,

    /// Retry without waiting.
    Immediate {
        /// The maximum number of retries.
        max_retries: usize,
    },

    /// Retry with exponentially increasing delays.
    ///
    /// Retry `n` waits `initial_delay * 2^(n - 1)`, capped at `max_delay`.
    ExponentialBackoff {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// The maximum number of retries.
        max_retries: usize,
        /// Scale each delay by a random factor in `[0.5, 1.0]`.
        jitter: bool,
    },

    /// Retry with a fixed delay.
    Linear {
        /// The delay before every retry.
        delay: Duration,
        /// The maximum number of retries.
        max_retries: usize,
    },

    /// Custom pacing.
    ///
    /// The function receives the retry counter (1 for the first retry) and
    /// returns the delay before that retry, or `None` to stop.
    Custom {
        /// Function that determines retry delay.
        delay_fn: fn(retry: usize) -> Option<Duration>,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Immediate {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryStrategy {
    /// Returns the delay before retry number `retry` (1-indexed), or `None`
    /// once the cap is reached.
    pub fn delay_for_retry(&self, retry: usize) -> Option<Duration> {
        if let Some(max) = self.max_retries() {
            if retry > max {
                return None;
            }
        }

        match self {
            RetryStrategy::None => None,
            RetryStrategy::Immediate { .. } => Some(Duration::ZERO),
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                jitter,
                ..
            } => {
                let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX);
                let multiplier = 2u32.saturating_pow(exponent);
                let delay = initial_delay.saturating_mul(multiplier).min(*max_delay);

                if *jitter {
                    let factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { delay, .. } => Some(*delay),
            RetryStrategy::Custom { delay_fn } => delay_fn(retry),
        }
    }

    /// Returns the maximum number of retries, if the strategy has a fixed cap.
    pub fn max_retries(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(0),
            RetryStrategy::Immediate { max_retries }
            | RetryStrategy::ExponentialBackoff { max_retries, .. }
            | RetryStrategy::Linear { max_retries, .. } => Some(*max_retries),
            RetryStrategy::Custom { .. } => None,
        }
    }
}
