//! Bounded retry with exponential backoff
//!
//! Transient renderer failures (navigation timeouts, connection resets) re-issue the
//! identical operation after a growing, optionally jittered delay. Once the attempt
//! budget is spent the last transient error is reported as [`Error::FetchExhausted`].
//! Classified outcomes such as a page without content are never retried.
//!
//! # Example
//!
//! ```no_run
//! use japdl::config::RetryConfig;
//! use japdl::retry::{IsRetryable, retry_with_backoff};
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Reset,
//!     Gone,
//! }
//!
//! impl std::fmt::Display for FetchError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for FetchError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, FetchError::Reset)
//!     }
//! }
//!
//! # async fn example() -> Result<(), FetchError> {
//! let config = RetryConfig::default();
//! let _bytes = retry_with_backoff(&config, || async { Ok::<_, FetchError>(vec![0u8; 4]) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Classifies errors as transient (worth re-issuing) or final
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Navigation { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Already the terminal form of a transient failure
            Error::FetchExhausted { .. } => false,
            Error::Config { .. }
            | Error::Catalog(_)
            | Error::Range(_)
            | Error::Archive(_)
            | Error::AlreadyExists { .. }
            | Error::PageUnavailable { .. }
            | Error::ConflictingOptions(_)
            | Error::InvalidLink { .. }
            | Error::UnknownKind(_)
            | Error::UnknownCommand(_)
            | Error::MissingArguments { .. }
            | Error::Cancelled
            | Error::ShuttingDown
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures with exponential backoff
///
/// The operation runs at most `config.max_attempts + 1` times. Non-retryable errors
/// are returned immediately; the last retryable error is returned once the budget is
/// spent.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(wait).await;

                // overflow or a negative product clamps to the ceiling
                let next = Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                    .unwrap_or(config.max_delay);
                delay = next.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts"
                    );
                } else {
                    tracing::debug!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Run one renderer navigation under timeout, bounded retry and cancellation
///
/// Each attempt is bounded by `timeout`; an elapsed attempt counts as a transient
/// [`Error::Navigation`]. Cancellation is observed during attempts and backoff sleeps
/// alike and yields [`Error::Cancelled`]. A transient failure that survives every
/// attempt becomes [`Error::FetchExhausted`] naming `what`.
pub async fn navigate<F, Fut, T>(
    config: &RetryConfig,
    timeout: Duration,
    cancel: &CancellationToken,
    what: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let attempt = || {
        let fut = operation();
        async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(Error::Navigation {
                    link: what.to_string(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                }),
            }
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        result = retry_with_backoff(config, attempt) => result,
    };

    result.map_err(|e| {
        if e.is_retryable() {
            Error::FetchExhausted {
                operation: what.to_string(),
                attempts: config.max_attempts + 1,
                last_error: e.to_string(),
            }
        } else {
            e
        }
    })
}

/// Add random jitter to a delay, between 0% and 100% of it
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
