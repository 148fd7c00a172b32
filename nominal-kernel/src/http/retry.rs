// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Retry-with-jitter loop shared by every component that talks HTTP.
//!
//! Transient failures — network read/connect errors and status
//! `{308, 429, 500, 502, 503, 504}` — are retried with exponential backoff.
//! 4xx statuses other than those are the caller's problem: this loop never
//! retries them.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;

use super::client::HttpClientConfig;
use crate::error::{Error, Result};

/// Run `request_fn` up to `config.max_retries + 1` times, retrying only on
/// transient failures, backing off exponentially with optional jitter
/// between attempts.
pub async fn execute_with_retry<T, F>(config: &HttpClientConfig, mut request_fn: F) -> Result<T>
where
    F: FnMut() -> Pin<Box<dyn Future<Output = Result<T>> + Send>>,
{
    let mut attempt: u32 = 0;
    loop {
        match request_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_retries && should_retry(&err) => {
                let delay = calculate_delay(
                    attempt,
                    config.retry_base_delay,
                    config.retry_max_delay,
                    config.retry_jitter,
                );
                tracing::debug!(attempt, ?delay, "retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Decide whether an error is transient and worth retrying.
fn should_retry(err: &Error) -> bool {
    match err {
        Error::Api { status, .. } => Error::is_retryable_status(*status),
        Error::Transport { source } => {
            source.is_timeout() || source.is_connect() || source.is_request()
        }
        _ => false,
    }
}

/// Exponential backoff with a ceiling and optional up-to-25% jitter,
/// matching the shape of every other retry loop in this codebase.
fn calculate_delay(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
) -> Duration {
    let exp = base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = exp.min(max_delay);
    if !jitter {
        return capped;
    }
    let jitter_ceiling = capped / 4;
    if jitter_ceiling.is_zero() {
        return capped;
    }
    let extra = rand::thread_rng().gen_range(0..=jitter_ceiling.as_millis() as u64);
    capped + Duration::from_millis(extra)
}
