//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use engine_core::{Error, Result};

/// Ceiling on a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: u32,
}

impl Backoff {
    /// Doubling delays starting at `initial`.
    pub fn exponential(initial: Duration) -> Self {
        Self { initial, factor: 2 }
    }

    /// Delay after the `attempt`-th failure (1-based): `initial * factor^(attempt-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.initial
            .checked_mul(multiplier)
            .map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
    }
}

/// Run `op` up to `attempts` times, sleeping between failures.
///
/// `on_retry` sees the failed attempt number and its error before each sleep.
/// Errors that are not transient are returned immediately.
pub async fn retry<T, F, Fut, R>(
    attempts: u32,
    backoff: Backoff,
    mut on_retry: R,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, &Error),
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts || !e.is_transient() => return Err(e),
            Err(e) => {
                on_retry(attempt, &e);
                tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}
