//! Retry policy for HTTP transports.
//!
//! Network errors and 5xx responses are retried with exponential backoff.
//! 4xx responses are not retried.

use super::DeliveryReceipt;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Backoff and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 3).
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each later one (default: 1000).
    pub base_delay_ms: u64,
    /// Per-request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl RetryPolicy {
    /// Delay in milliseconds before retrying after failed `attempt` (1-based).
    ///
    /// Formula: `base_delay_ms * 2^(attempt - 1)`, with the exponent capped at 10.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        self.base_delay_ms
            .saturating_mul(1 << (attempt - 1).min(10))
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Failure of a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The request never produced a response.
    Network(String),
    /// The endpoint answered with a non-success status.
    Status(u16),
}

impl AttemptError {
    const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => *code >= 500,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Network(cause) => format!("HTTP request failed: {cause}"),
            Self::Status(code) => format!("HTTP {code} response"),
        }
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or retries run out.
///
/// `attempt` returns the reference to put on the receipt (status code or
/// provider message id).
///
/// # Errors
///
/// Returns [`Error::Transport`] with the last failure.
pub fn send_with_retry<F>(
    transport: &'static str,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<DeliveryReceipt>
where
    F: FnMut() -> std::result::Result<String, AttemptError>,
{
    let start = Instant::now();
    let max_attempts = policy.max_retries.saturating_add(1);

    let mut number = 1;
    loop {
        match attempt() {
            Ok(reference) => {
                return Ok(DeliveryReceipt {
                    transport,
                    attempts: number,
                    duration_ms: elapsed_ms(start),
                    reference: Some(reference),
                });
            },
            Err(error) if !error.is_retryable() || number >= max_attempts => {
                return Err(Error::Transport {
                    transport: transport.to_string(),
                    cause: format!("{} after {number} attempt(s)", error.describe()),
                });
            },
            Err(error) => {
                let delay_ms = policy.delay_for_attempt(number);
                tracing::debug!(
                    transport,
                    attempt = number,
                    delay_ms,
                    error = %error.describe(),
                    "retrying notification"
                );
                std::thread::sleep(Duration::from_millis(delay_ms));
                number += 1;
            },
        }
    }
}

/// Milliseconds since `start`, saturating at `u64::MAX`.
pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 0,
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), 0);
        assert_eq!(policy.delay_for_attempt(1), 1000);
        assert_eq!(policy.delay_for_attempt(2), 2000);
        assert_eq!(policy.delay_for_attempt(3), 4000);
        assert_eq!(policy.delay_for_attempt(40), 1000 * 1024);
    }

    #[test]
    fn test_server_errors_are_retried() {
        let mut calls = 0;
        let receipt = send_with_retry("test", &fast(), || {
            calls += 1;
            if calls < 3 {
                Err(AttemptError::Status(503))
            } else {
                Ok("200".to_string())
            }
        })
        .unwrap();
        assert_eq!(receipt.attempts, 3);
        assert_eq!(receipt.reference.as_deref(), Some("200"));
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let mut calls = 0;
        let err = send_with_retry("test", &fast(), || {
            calls += 1;
            Err(AttemptError::Status(401))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(
            err.to_string(),
            "transport 'test' failed: HTTP 401 response after 1 attempt(s)"
        );
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let mut calls = 0;
        let result = send_with_retry("test", &fast(), || {
            calls += 1;
            Err(AttemptError::Network("connection refused".to_string()))
        });
        assert!(matches!(result, Err(Error::Transport { .. })));
        assert_eq!(calls, 3);
    }
}
