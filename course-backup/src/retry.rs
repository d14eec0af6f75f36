//! Retry with exponential backoff for idempotent remote calls.
//!
//! Export creation is never routed through here: retrying it could start a
//! second remote export for the same course.

use crate::config::RetryConfig;
use crate::utils::errors::BackupError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient (worth retrying) or permanent.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for BackupError {
    fn is_retryable(&self) -> bool {
        match self {
            BackupError::Http(e) => e.is_timeout() || e.is_connect(),
            BackupError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            BackupError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Run `operation`, retrying retryable failures up to `config.max_attempts` times.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay();

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Remote call failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                delay = next_delay(delay, config);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`.
///
/// Products that are not representable as a `Duration` (negative, NaN,
/// overflow) fall back to the cap.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay())
        .min(config.max_delay())
}

/// Stretch `delay` by a random factor in [1, 2].
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}
