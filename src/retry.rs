//! Retry logic for session bring-up
//!
//! The DevTools endpoint is often not up yet when segment-dl starts (the browser is
//! launched separately with `--remote-debugging-port`). The connector therefore retries
//! the whole connect sequence. The default policy is a fixed interval with no attempt
//! limit; [`RetryConfig`] can bound it, grow the delay, or add jitter, and every wait
//! is cancellable.
//!
//! # Example
//!
//! ```no_run
//! use segment_dl::config::RetryConfig;
//! use segment_dl::error::Error;
//! use segment_dl::retry::retry_with_backoff;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let value = retry_with_backoff(&config, &cancel, || async {
//!     Ok::<_, Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (endpoint not listening yet, handshake refused) should return `true`.
/// Permanent failures (bad configuration, cancelled) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        matches!(self.disposition(), crate::error::Disposition::Retry)
    }
}

/// Execute an async operation, retrying retryable failures per `config`
///
/// Returns the successful result, the first non-retryable error, or the last error once
/// `config.max_attempts` retries are exhausted. When `cancel` fires, the pending attempt
/// or wait is dropped and `Error::Cancelled` is returned (converted into `E`).
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display + From<Error>,
{
    let mut attempt: u32 = 0;
    let mut delay = config.initial_delay;

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(E::from(Error::Cancelled)),
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && config.max_attempts.is_none_or(|max| attempt < max) => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = ?config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tokio::select! {
                    _ = cancel.cancelled() => return Err(E::from(Error::Cancelled)),
                    _ = tokio::time::sleep(wait) => {}
                }

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
