//! Retry policy for transport calls

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::errors::TransportError;

/// Errors that know whether a retry can help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        TransportError::is_retryable(self)
    }
}

/// Exponential backoff with ±20% jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current_attempt: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    max_retries: u32,
}

impl ExponentialBackoff {
    pub fn new(initial_backoff_ms: u64, max_backoff_ms: u64, max_retries: u32) -> Self {
        Self {
            current_attempt: 0,
            initial_backoff_ms,
            max_backoff_ms,
            max_retries,
        }
    }

    /// Next delay, or `None` once retries are exhausted
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_retries {
            return None;
        }

        let factor = 2_u64.saturating_pow(self.current_attempt);
        let backoff_ms = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        self.current_attempt += 1;

        let jitter = backoff_ms / 5;
        let final_backoff = if jitter == 0 {
            backoff_ms
        } else {
            rand::thread_rng().gen_range(backoff_ms - jitter..=backoff_ms + jitter)
        };
        Some(Duration::from_millis(final_backoff))
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(200, 5_000, 3)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// backoff is exhausted
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: &str,
    mut backoff: ExponentialBackoff,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        operation,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}
