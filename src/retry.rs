//! Bounded retry with exponential backoff.
//!
//! Every collaborator call in the engine goes through this one helper:
//! a per-attempt timeout, a small fixed number of attempts, exponential
//! backoff with a cap, and random jitter. A failed call surfaces as
//! `CollaboratorError::RetriesExhausted` and the evaluation cycle gives
//! up without touching engine state.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::catalog::RetrySettings;
use crate::error::CollaboratorError;

/// Computes the backoff delay before retry attempt `attempt` (0-based:
/// the delay taken after the first failure is `backoff_delay(_, 0)`).
///
/// Exponential from `base_delay_ms`, capped at `max_delay_ms`. Jitter is
/// added separately so this function stays deterministic for tests.
#[must_use]
pub fn backoff_delay(settings: &RetrySettings, attempt: u32) -> Duration {
    let max_exponent = 6; // base 500ms -> caps near 32s
    let exponent = attempt.min(max_exponent);
    let delay_ms = settings
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(settings.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Runs `op` with the shared retry discipline.
///
/// Each attempt is bounded by `call_timeout_ms`. After a failed attempt
/// the task sleeps for the backoff delay plus jitter, then retries, up
/// to `max_attempts` total attempts.
///
/// # Errors
///
/// Returns `CollaboratorError::RetriesExhausted` carrying the last
/// observed error once all attempts fail.
pub async fn call_with_retry<T, F, Fut>(
    settings: &RetrySettings,
    role: &'static str,
    mut op: F,
) -> Result<T, CollaboratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let attempts = settings.max_attempts.max(1);
    let timeout = Duration::from_millis(settings.call_timeout_ms);
    let mut last: Option<CollaboratorError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let jitter_ms = if settings.jitter_ms > 0 {
                rand::rng().random_range(0..=settings.jitter_ms)
            } else {
                0
            };
            let delay = backoff_delay(settings, attempt - 1) + Duration::from_millis(jitter_ms);
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                warn!(role, attempt = attempt + 1, error = %err, "collaborator call failed");
                last = Some(err);
            }
            Err(_) => {
                warn!(role, attempt = attempt + 1, timeout_ms = settings.call_timeout_ms, "collaborator call timed out");
                last = Some(CollaboratorError::Timeout {
                    role,
                    timeout_ms: settings.call_timeout_ms,
                });
            }
        }
    }

    Err(CollaboratorError::RetriesExhausted {
        role,
        attempts,
        last: last.map_or_else(|| "no attempts made".to_string(), |e| e.to_string()),
    })
}
