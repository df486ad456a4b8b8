//! Backoff policy for transient browser-session failures.
//!
//! The worker state machine computes its own delays with [`backoff_delay`] so
//! that the `BackingOff` state stays observable and cancellable. Session
//! opening, which has no intermediate states worth exposing, goes through
//! [`retry_with_backoff`].

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Upper bound for a single backoff sleep.
const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - [`FetchError::RateLimited`]: HTTP 429, the platform asked us to slow down.
/// - [`FetchError::Timeout`]: the page did not finish rendering in time.
/// - [`FetchError::Http`]: timeouts, connection failures, 5xx.
/// - [`FetchError::UnexpectedStatus`] with a 5xx status.
///
/// **Not retriable:** other statuses (401, 403, 404) and
/// [`FetchError::InvalidEndpoint`]; retrying would return the same result.
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::RateLimited { .. } | FetchError::Timeout { .. } => true,
        FetchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FetchError::UnexpectedStatus { status, .. } => *status >= 500,
        FetchError::InvalidEndpoint { .. } => false,
    }
}

/// Delay before retry number `attempt` (1-based).
///
/// `backoff_base_ms * 2^(attempt-1)`, capped at 60 s, with ±25 % jitter. A
/// rate-limit response's `Retry-After` acts as a floor.
#[must_use]
pub fn backoff_delay(attempt: u32, backoff_base_ms: u64, err: &FetchError) -> Duration {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    let floor_ms = match err {
        FetchError::RateLimited {
            retry_after_secs, ..
        } => retry_after_secs.saturating_mul(1_000).min(MAX_DELAY_MS),
        _ => 0,
    };
    Duration::from_millis(jittered.max(floor_ms))
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = backoff_delay(attempt, backoff_base_ms, &err);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient session error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
