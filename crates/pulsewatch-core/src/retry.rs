//! Generic retry with bounded attempts for remote calls.
//!
//! [`retry`] wraps any fallible async operation whose error type reports
//! whether it is transient. Transient errors (network failures, 5xx, rate
//! limits) are retried after a delay; everything else is returned
//! immediately without consuming retry budget. Each remote call gets its own
//! wrapper — attempt budgets are never shared across calls.

use std::future::Future;
use std::time::Duration;

/// Errors that may succeed on a later attempt report themselves transient.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Delay policy between attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Delay doubles per retry starting from `base`, capped at 60 s,
    /// with ±25 % jitter.
    Exponential { base: Duration },
}

const MAX_DELAY_MS: u64 = 60_000;

impl Backoff {
    /// Delay to sleep before retry number `retry` (1-based).
    fn delay(self, retry: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base } => {
                let base_ms = u64::try_from(base.as_millis()).unwrap_or(MAX_DELAY_MS);
                let computed = base_ms.saturating_mul(1u64 << (retry - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                Duration::from_millis(jittered)
            }
        }
    }
}

/// Runs `operation` up to `max_attempts` times total, sleeping per `backoff`
/// between attempts.
///
/// Non-transient errors are returned immediately. An operation that fails
/// transiently on every attempt is invoked exactly `max_attempts` times and
/// the last error is returned. `max_attempts` of zero is treated as one.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, backoff: Backoff, mut operation: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(err);
                }
                let delay = backoff.delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient error — retrying after back-off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
