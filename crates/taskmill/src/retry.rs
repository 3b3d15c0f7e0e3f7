//! Retry policy for task execution
//!
//! Supports exponential backoff with a delay cap and additive jitter to avoid
//! thundering herd.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a failing task is retried.
///
/// The first attempt counts, so `max_attempts: 1` means no retries.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskmill::RetryPolicy;
///
/// let policy = RetryPolicy::default()
///     .with_max_attempts(5)
///     .with_base_delay(Duration::from_millis(100))
///     .with_max_delay(Duration::from_secs(5))
///     .with_jitter(0.2);
///
/// // Waits between attempts: ~100ms, ~200ms, ~400ms, ~800ms (plus jitter),
/// // clamped at 5s.
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first (0 = retry until cancelled)
    pub max_attempts: u32,

    /// Delay before the first retry (zero falls back to 1 ms)
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,

    /// Cap on the exponential backoff (zero = no cap)
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Fraction of the delay added as a random offset, in `(0.0, 1.0]`.
    ///
    /// Values outside that range disable jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts (0 = unbounded)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay before the first retry
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff cap (zero = no cap)
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter fraction; values outside `(0.0, 1.0]` disable jitter
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// The wait before the first retry; `base_delay` with a 1 ms floor.
    pub fn initial_delay(&self) -> Duration {
        if self.base_delay.is_zero() {
            Duration::from_millis(1)
        } else {
            self.base_delay
        }
    }

    /// The wait that follows `current`: doubled, then clamped by `max_delay`
    /// when a cap is set.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let doubled = current.saturating_mul(2);
        if !self.max_delay.is_zero() && doubled > self.max_delay {
            self.max_delay
        } else {
            doubled
        }
    }

    /// Whether `attempts` invocations have used up the attempt budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }

    /// Whether jitter is active for this policy.
    pub fn jitter_enabled(&self) -> bool {
        self.jitter > 0.0 && self.jitter <= 1.0
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
