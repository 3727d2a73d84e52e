//! Retry decision and backoff schedule for transient failures
//!
//! A failure is retryable when no response arrived at all, or when the
//! server answered 408, 429 or any 5xx. The backoff is linear in the attempt
//! number: with the default base of one second, the waits are 1s, 2s, 3s.
//!
//! Retrying is opt-in per call site (see
//! [`ApiClient::request_with_retry`](crate::client::ApiClient::request_with_retry)),
//! since not every operation is idempotent.

use std::time::Duration;

use ledgerdesk_core::config::RetryConfig;

use crate::RequestFailure;

/// Default number of re-issues after the first failed attempt
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retry budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Builds the policy from the `retry` configuration section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Budget handed to the retry wrapper when the caller gives none
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Whether `failure` is worth re-issuing
    pub fn is_retryable(failure: &RequestFailure) -> bool {
        match failure {
            RequestFailure::NoResponse(_) => true,
            RequestFailure::Response { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Wait before the next attempt, given the attempts still left
    ///
    /// `base * (max_attempts - attempts_left + 1)`: the first retry waits one
    /// unit, the second two, and so on.
    pub fn delay_for(&self, attempts_left: u32) -> Duration {
        let attempt_number = self.max_attempts.saturating_sub(attempts_left) + 1;
        self.base_delay.saturating_mul(attempt_number)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

/// 408 Request Timeout, 429 Too Many Requests and every 5xx
pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}
