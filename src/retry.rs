//! Retry policy: classification and exponential backoff.
//!
//! The original engine also carried a token-bucket retry budget scoped per
//! host (permitting, by default, 20% extra load from retries). SPEC_FULL.md
//! never names a budget, only a classifier and an exponential backoff
//! schedule, so it's dropped here; [`RetryConfig`] is the engine's single
//! retry knob.

use std::time::Duration;

use http::StatusCode;

use crate::error::Error;

/// What should happen after an attempt completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Return the outcome to the caller as final.
    Stop,
    /// Retry after the given delay.
    Retry,
}

/// Exponential backoff and retry classification.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (the first try plus up to this many
    /// retries). `0` disables retrying entirely.
    pub max_retries: u32,
    /// Base delay used in the exponential backoff schedule.
    pub base_delay: Duration,
    /// Upper bound a computed delay is clamped to.
    pub max_delay: Duration,
    /// Adds up to ±10% jitter to each computed delay, to avoid synchronized
    /// retry storms across clients.
    pub jitter: bool,
    /// Status codes considered transient and retryable.
    pub retry_statuses: Vec<StatusCode>,
}

impl Default for RetryConfig {
    fn default() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
            retry_statuses: vec![
                StatusCode::REQUEST_TIMEOUT,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn never() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        }
    }

    /// The delay before the `attempt`-th retry (1-based: the delay before
    /// the first retry is `base_delay`, before the second is `2 *
    /// base_delay`, and so on), clamped to `max_delay` and optionally
    /// jittered by up to ±10%.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let factor = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(factor).min(self.max_delay.as_millis() as u64);

        if self.jitter && delay_ms > 0 {
            let jitter_range = (delay_ms / 10).max(1);
            let offset = rand::random::<u64>() % (2 * jitter_range + 1);
            let jittered = delay_ms as i64 - jitter_range as i64 + offset as i64;
            Duration::from_millis(jittered.max(0) as u64)
        } else {
            Duration::from_millis(delay_ms)
        }
    }

    /// True if `status` is in the configured retryable set.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status)
    }

    pub(crate) fn classify(&self, attempt: u32, outcome: &Result<StatusCode, Error>) -> Action {
        if attempt > self.max_retries {
            return Action::Stop;
        }
        let retryable = match outcome {
            Ok(status) => self.is_retryable_status(*status),
            Err(e) => e.is_retryable_by_default(),
        };
        if retryable {
            Action::Retry
        } else {
            Action::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_without_jitter() {
        let cfg = RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for(1), Duration::from_millis(100));
        assert_eq!(cfg.delay_for(2), Duration::from_millis(200));
        assert_eq!(cfg.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_clamps_to_max_delay() {
        let cfg = RetryConfig {
            jitter: false,
            max_delay: Duration::from_millis(250),
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for(10), Duration::from_millis(250));
    }

    #[test]
    fn never_stops_immediately() {
        let cfg = RetryConfig::never();
        assert_eq!(cfg.classify(1, &Ok(StatusCode::SERVICE_UNAVAILABLE)), Action::Stop);
    }

    #[test]
    fn retries_default_status_set() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.classify(1, &Ok(StatusCode::SERVICE_UNAVAILABLE)), Action::Retry);
        assert_eq!(cfg.classify(1, &Ok(StatusCode::NOT_FOUND)), Action::Stop);
    }

    #[test]
    fn exhausts_after_max_retries() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.classify(3, &Ok(StatusCode::SERVICE_UNAVAILABLE)), Action::Stop);
    }
}
