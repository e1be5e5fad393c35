//! Shared retry-with-backoff helper.
//!
//! One abstraction parameterized by (operation, attempt budget, retryable
//! classification), consumed identically by the transfer and indexing
//! paths so backoff behavior cannot drift between them.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff parameters: `delay = min(initial * 2^attempt, max) + jitter`,
/// jitter uniform in `[0, jitter]`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            jitter: Duration::from_millis(250),
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry following failed attempt number `attempt`
    /// (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };

        exponential + jitter
    }
}

/// Run `op` until it succeeds, the error is not retryable, or the attempt
/// budget is exhausted. Returns the value or final error together with the
/// number of attempts made.
///
/// `op` receives the zero-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<(T, u32), (E, u32)>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt + 1)),
            Err(error) => {
                let attempts_made = attempt + 1;
                if attempts_made >= policy.max_attempts || !is_retryable(&error) {
                    return Err((error, attempts_made));
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    error = %error,
                    attempt = attempts_made,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
