// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff retry for transient failures.

use std::future::Future;
use std::time::Duration;

use leadhub_config::model::IngestionConfig;
use leadhub_core::LeadhubError;
use rand::Rng;
use tracing::{debug, warn};

/// Upper bound on the random jitter added to each delay.
const MAX_JITTER_MS: u64 = 100;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to [`MAX_JITTER_MS`] of random delay so retries spread out.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

impl From<&IngestionConfig> for RetryPolicy {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`, plus jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self.base_delay.saturating_mul(exponent).min(self.max_delay);
        if self.jitter && !base.is_zero() {
            let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
            base.saturating_add(Duration::from_millis(jitter))
        } else {
            base
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// The error of the last attempt of a failed retry loop.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
    /// True when every attempt failed with a retryable error.
    pub exhausted: bool,
}

impl<E> RetryFailure<E> {
    pub fn into_inner(self) -> E {
        self.error
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                        exhausted: false,
                    });
                }
                if attempt >= attempts {
                    warn!(operation, attempts = attempt, error = %error, "retries exhausted");
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                        exhausted: true,
                    });
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// [`retry`] classified by [`LeadhubError::is_transient`].
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> Result<T, RetryFailure<LeadhubError>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LeadhubError>>,
{
    retry(policy, operation, LeadhubError::is_transient, op).await
}
