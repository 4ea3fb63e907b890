// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff.
//!
//! Two policies live here: the optimistic-concurrency policy used by the
//! write-back subsystem, and the transient-failure policy used for registry
//! HTTP calls. Both are bounded so a stuck call never stalls its loop for long.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::constants::CONFLICT_RETRY_MAX_ATTEMPTS;

/// Conflict retry initial interval (10ms)
const CONFLICT_INITIAL_INTERVAL_MILLIS: u64 = 10;

/// Conflict retry maximum interval (1 second)
const CONFLICT_MAX_INTERVAL_SECS: u64 = 1;

/// Conflict retry growth factor
const CONFLICT_MULTIPLIER: f64 = 5.0;

/// Registry HTTP retry initial interval (50ms)
const REGISTRY_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// Registry HTTP retry maximum interval (2 seconds)
const REGISTRY_MAX_INTERVAL_SECS: u64 = 2;

/// Registry HTTP retry maximum elapsed time (10 seconds), the rebuild loop waits on it
const REGISTRY_MAX_ELAPSED_TIME_SECS: u64 = 10;

/// Registry HTTP retry growth factor
const REGISTRY_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter), bounded by total
/// elapsed time, by number of attempts, or both.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Maximum number of attempts, including the first one
    pub max_attempts: Option<u32>,
    /// Backoff multiplier
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Backoffs handed out so far
    retries: u32,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        max_attempts: Option<u32>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            max_attempts,
            multiplier,
            randomization_factor,
            retries: 0,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None once the policy is exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_attempts) = self.max_attempts {
            // The first attempt is not a retry.
            if self.retries.saturating_add(1) >= max_attempts {
                return None;
            }
        }

        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);
        self.retries = self.retries.saturating_add(1);

        Some(jittered)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff for optimistic-concurrency conflicts on write-back.
///
/// # Configuration
///
/// - **Initial interval**: 10ms
/// - **Max interval**: 1 second
/// - **Max attempts**: 5
/// - **Multiplier**: 5.0
/// - **Randomization**: ±10%
///
/// Retries occur at approximately 10ms, 50ms, 250ms and 1s.
#[must_use]
pub fn conflict_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(CONFLICT_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(CONFLICT_MAX_INTERVAL_SECS),
        None,
        Some(CONFLICT_RETRY_MAX_ATTEMPTS),
        CONFLICT_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Backoff for transient registry HTTP failures.
///
/// Registry calls run inside the rebuild loop, so the retry window is short: a
/// backend that stays down is retried by the next rebuild cycle instead.
///
/// # Configuration
///
/// - **Initial interval**: 50ms
/// - **Max interval**: 2 seconds
/// - **Max elapsed time**: 10 seconds total
/// - **Multiplier**: 2.0
/// - **Randomization**: ±10%
#[must_use]
pub fn registry_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(REGISTRY_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(REGISTRY_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(REGISTRY_MAX_ELAPSED_TIME_SECS)),
        None,
        REGISTRY_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Determine if an HTTP status code is retryable.
///
/// # Retryable Status Codes
///
/// - **429** (Too Many Requests) - Rate limiting
/// - **500** (Internal Server Error) - Server error
/// - **502** (Bad Gateway) - Proxy/gateway error
/// - **503** (Service Unavailable) - Temporary unavailability
/// - **504** (Gateway Timeout) - Gateway timeout
#[must_use]
pub const fn is_retryable_http_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// backoff is exhausted.
///
/// Every attempt calls `operation` afresh, so callers that need to re-read
/// state (e.g. re-fetch an object after a conflict) do so inside it.
///
/// # Errors
///
/// Returns the last error when it is not retryable or when the backoff is exhausted.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    mut backoff: ExponentialBackoff,
    operation_name: &str,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let start_time = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }

                let Some(duration) = backoff.next_backoff() else {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                };

                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Retryable error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
