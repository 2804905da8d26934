use std::time::Duration;

use crate::error::StepFailure;

/// How often a step's action is re-invoked after a [`FailureKind::Retryable`] failure.
///
/// Only actions are retried; compensations run exactly once. Rejected and unexpected
/// failures are never retried.
///
/// [`FailureKind::Retryable`]: crate::FailureKind::Retryable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Invoke every action exactly once.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Three retries, 100 ms apart.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(3, Duration::from_millis(100))
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether another attempt should follow `failure` after `attempts` invocations so far.
    ///
    /// The attempt count itself is bounded by `u32::MAX`, so a policy allowing that many
    /// retries still stops once the counter is exhausted.
    #[must_use]
    pub fn should_retry(&self, failure: &StepFailure, attempts: u32) -> bool {
        failure.is_retryable() && attempts <= self.max_retries && attempts < u32::MAX
    }
}
