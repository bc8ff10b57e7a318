//! Fixed-delay retry policy.

use chrono::{DateTime, Duration, Utc};

use ironrelay_core::config::WorkerConfig;

/// What to do with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending`, eligible from `at`.
    Reschedule { at: DateTime<Utc> },
    /// Budget used up; the job becomes `failed`.
    Exhausted,
}

/// Retries after a constant delay, with no backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A delay too large for a chrono duration saturates; such jobs are
    /// never rescheduled, see [`RetryPolicy::decide`].
    pub fn from_config(config: &WorkerConfig) -> Self {
        let delay = Duration::from_std(config.retry_delay()).unwrap_or_else(|_| Duration::max_value());
        Self::new(delay)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// `attempts` already includes the attempt that just failed.
    ///
    /// A retry time past the representable range exhausts the job.
    pub fn decide(&self, attempts: i32, max_attempts: i32, now: DateTime<Utc>) -> RetryDecision {
        if attempts >= max_attempts {
            return RetryDecision::Exhausted;
        }
        match now.checked_add_signed(self.delay) {
            Some(at) => RetryDecision::Reschedule { at },
            None => RetryDecision::Exhausted,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::seconds(3))
    }
}
