//! Retry logic with exponential backoff for transient fetch failures.
//!
//! A failed request is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - may succeed on retry (timeouts, resets, 5xx)
//! - [`FailureType::Permanent`] - won't succeed regardless of retries (4xx, bad URL, disk)
//! - [`FailureType::RateLimited`] - HTTP 429, retried after `Retry-After` or backoff
//!
//! [`RetryPolicy::should_retry`] turns that classification and the attempt
//! count into a [`RetryDecision`].
//!
//! # Example
//!
//! ```
//! use scraping_by::fetch::{classify_error, FetchError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = FetchError::http_status("https://example.com/document.cfm", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument};

use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::FetchError;

/// Default maximum attempts per request (initial attempt included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Upper bound on jitter; smaller base delays get proportionally less.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Permanent failure that won't succeed regardless of retries.
    Permanent,
    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on this request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Backoff for crawl requests.
///
/// The delay doubles with each failed attempt up to `max_delay`, plus random
/// jitter so tasks that failed together do not retry in lockstep:
///
/// ```text
/// delay = min(base_delay * 2^(attempt - 1), max_delay) + rand(0..=min(base_delay, 500ms))
/// ```
///
/// With defaults, delays are approximately 1s then 2s before attempts run out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl RetryPolicy {
    /// `max_attempts` includes the initial attempt and is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Default delays with a custom attempt budget.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.backoff(attempt) + self.jitter();
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Capped exponential delay without jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << doublings)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    fn jitter(&self) -> Duration {
        let bound = u64::try_from(self.base_delay.min(MAX_JITTER).as_millis()).unwrap_or(0);
        Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
    }
}

/// Classifies a fetch error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | 408, 5xx | Transient |
/// | 429 | RateLimited |
/// | other 4xx | Permanent |
/// | Timeout | Transient |
/// | Network (TLS/certificate) | Permanent |
/// | Network (other) | Transient |
/// | Io, InvalidUrl | Permanent |
#[instrument]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Timeout { .. } => FailureType::Transient,
        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        FetchError::Io { .. } | FetchError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

/// Runs `operation` against `url` until it succeeds or the policy gives up.
///
/// Each attempt first waits on the per-domain rate limiter. A 429 carrying
/// `Retry-After` is waited out instead of the backoff delay, and the host is
/// paused in the limiter so other tasks hold off too. Returns the last error together with the number of attempts.
///
/// # Errors
///
/// Returns the final [`FetchError`] and the attempt count once retries are exhausted
/// or the failure is permanent.
pub async fn retry_fetch<T, F, Fut>(
    url: &str,
    policy: &RetryPolicy,
    rate_limiter: &RateLimiter,
    mut operation: F,
) -> Result<T, (FetchError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        rate_limiter.acquire(url).await;

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let failure_type = classify_error(&error);
        let retry_after = match &error {
            FetchError::HttpStatus {
                retry_after: Some(value),
                ..
            } if failure_type == FailureType::RateLimited => parse_retry_after(value),
            _ => None,
        };
        if let Some(delay) = retry_after {
            rate_limiter.pause_host(url, delay);
        }

        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay: backoff_delay,
                attempt: next_attempt,
            } => {
                let delay = retry_after.unwrap_or(backoff_delay);
                info!(
                    url = %url,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    using_retry_after = retry_after.is_some(),
                    error = %error,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url = %url, %reason, "not retrying request");
                return Err((error, attempt));
            }
        }
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient,   // Request Timeout
        429 => FailureType::RateLimited, // Too Many Requests
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}
