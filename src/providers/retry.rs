//! Retry schedule for model requests.
//!
//! The model client retries transport failures and server errors on a fixed
//! ascending schedule (1s, 3s, 8s by default). HTTP 429 is handled apart from
//! the schedule: the client waits for the server-supplied `retry-after`
//! (falling back to the current step) and tries again without spending an
//! attempt. Consecutive 429 waits are capped so a permanently throttled
//! endpoint still fails eventually.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use lapka::providers::retry::{AttemptError, RetrySchedule};
//!
//! # tokio_test::block_on(async {
//! let schedule = RetrySchedule::new(vec![Duration::from_millis(1); 3]);
//! let mut calls = 0;
//! let value = schedule
//!     .run(|| {
//!         calls += 1;
//!         let n = calls;
//!         async move {
//!             if n < 2 {
//!                 Err(AttemptError::Failed(lapka::error::ProviderError::ServerError("boom".into()).into()))
//!             } else {
//!                 Ok(n)
//!             }
//!         }
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(value, 2);
//! # });
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{LapkaError, Result};

/// Default backoff steps; the number of steps is the number of attempts.
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(8),
];

/// Maximum number of consecutive 429 waits that do not consume an attempt.
pub const DEFAULT_MAX_RATE_LIMIT_WAITS: usize = 10;

/// Upper bound on a server-directed `retry-after` wait.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// HTTP 429 with the server's `retry-after`, when present.
    RateLimited {
        retry_after: Option<Duration>,
        error: LapkaError,
    },
    /// Any other failure.
    Failed(LapkaError),
}

impl From<LapkaError> for AttemptError {
    fn from(err: LapkaError) -> Self {
        AttemptError::Failed(err)
    }
}

/// Fixed-schedule retry policy.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
    max_rate_limit_waits: usize,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAYS.to_vec())
    }
}

impl RetrySchedule {
    /// Create a schedule from explicit backoff steps.
    ///
    /// An empty list is treated as a single attempt with no backoff.
    pub fn new(delays: Vec<Duration>) -> Self {
        let delays = if delays.is_empty() {
            vec![Duration::ZERO]
        } else {
            delays
        };
        Self {
            delays,
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
        }
    }

    /// Set the cap on consecutive free 429 waits.
    pub fn with_max_rate_limit_waits(mut self, waits: usize) -> Self {
        self.max_rate_limit_waits = waits;
        self
    }

    /// Number of fixed-schedule attempts.
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    /// Run `op` until it succeeds, fails terminally, or the schedule is spent.
    ///
    /// Non-retryable failures (see [`is_retryable`]) are returned unchanged.
    /// Exhaustion yields [`LapkaError::RetriesExhausted`] wrapping the last error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let mut attempt = 0;
        let mut rate_limit_waits = 0;
        let mut last_err: Option<LapkaError> = None;

        while attempt < self.delays.len() {
            let step = self.delays[attempt];

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::RateLimited { retry_after, error })
                    if rate_limit_waits < self.max_rate_limit_waits =>
                {
                    rate_limit_waits += 1;
                    let wait = retry_after.unwrap_or(step).min(MAX_RETRY_AFTER);
                    warn!(
                        wait_ms = wait.as_millis() as u64,
                        waits = rate_limit_waits,
                        "Rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                    last_err = Some(error);
                    continue;
                }
                Err(AttemptError::RateLimited { error, .. }) => error,
                Err(AttemptError::Failed(error)) => error,
            };

            if !is_retryable(&error) {
                return Err(error);
            }

            attempt += 1;
            rate_limit_waits = 0;
            if attempt < self.delays.len() {
                warn!(
                    attempt = attempt,
                    attempts = self.delays.len(),
                    delay_ms = step.as_millis() as u64,
                    status = ?status_of(&error),
                    error = %error,
                    "LLM request failed, retrying"
                );
                tokio::time::sleep(step).await;
            }
            last_err = Some(error);
        }

        Err(LapkaError::RetriesExhausted {
            attempts: self.delays.len(),
            last: Box::new(last_err.unwrap_or_else(|| {
                LapkaError::Provider("retry loop exited without result".to_string())
            })),
        })
    }
}

/// Check whether an error is worth another attempt.
///
/// Typed provider errors delegate to
/// [`ProviderError::is_retryable`](crate::error::ProviderError::is_retryable);
/// transport errors are retried unless they come from decoding or building
/// the request.
pub fn is_retryable(err: &LapkaError) -> bool {
    match err {
        LapkaError::ProviderTyped(pe) => pe.is_retryable(),
        LapkaError::Http(e) => !(e.is_decode() || e.is_builder()),
        _ => false,
    }
}

/// HTTP status behind a typed provider error.
pub fn status_of(err: &LapkaError) -> Option<u16> {
    match err {
        LapkaError::ProviderTyped(pe) => pe.status_code(),
        _ => None,
    }
}

/// Parse a `retry-after` header value given in (possibly fractional) seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
