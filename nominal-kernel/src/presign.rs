// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Presigned-URL Cache (component B): a thread-safe, TTL-bounded holder for
//! a refreshable URL, with explicit invalidation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::Result;

type FetchFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;
type FetchFn = dyn Fn() -> FetchFuture + Send + Sync;

struct Cached {
    url: String,
    deadline: Instant,
}

/// Caches a presigned URL fetched via `fetch_fn`, refetching when the cached
/// entry's deadline has passed or when explicitly invalidated.
///
/// `deadline = now + max(0, ttl - skew)`, so a URL returned by `get` is
/// always valid for at least `skew` from the moment it is handed out.
pub struct PresignedUrlProvider {
    fetch_fn: Arc<FetchFn>,
    ttl: Duration,
    skew: Duration,
    cached: Mutex<Option<Cached>>,
}

impl PresignedUrlProvider {
    /// Construct a provider around an async `fetch_fn` that calls the
    /// control plane for a fresh presigned URL.
    pub fn new<F, Fut>(ttl: Duration, skew: Duration, fetch_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            fetch_fn: Arc::new(move || Box::pin(fetch_fn()) as FetchFuture),
            ttl,
            skew,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached URL if still fresh (or if `force` is set, always
    /// refetch). The fetch itself is performed under the lock so concurrent
    /// callers never trigger duplicate refreshes.
    pub async fn get(&self, force: bool) -> Result<String> {
        let now = Instant::now();
        let mut guard = self.cached.lock().await;

        let needs_refresh = force
            || match &*guard {
                Some(cached) => now >= cached.deadline,
                None => true,
            };

        if needs_refresh {
            let url = (self.fetch_fn)().await?;
            let deadline = now + self.ttl.saturating_sub(self.skew);
            tracing::debug!(?deadline, "refreshed presigned url");
            *guard = Some(Cached {
                url: url.clone(),
                deadline,
            });
            return Ok(url);
        }

        Ok(guard.as_ref().expect("checked above").url.clone())
    }

    /// Clear the cached slot so the next `get` refetches unconditionally.
    pub async fn invalidate(&self) {
        tracing::info!("invalidating presigned URL");
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fetches_once_then_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let provider = PresignedUrlProvider::new(Duration::from_secs(60), Duration::from_secs(5), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("https://example.com/u1".to_string())
            }
        });

        let first = provider.get(false).await.unwrap();
        let second = provider.get(false).await.unwrap();
        assert_eq!(first, "https://example.com/u1");
        assert_eq!(second, "https://example.com/u1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let provider = PresignedUrlProvider::new(Duration::from_secs(60), Duration::from_secs(5), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("https://example.com/u{n}"))
            }
        });

        let first = provider.get(false).await.unwrap();
        provider.invalidate().await;
        let second = provider.get(false).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn force_refetches_even_when_fresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let provider = PresignedUrlProvider::new(Duration::from_secs(60), Duration::from_secs(5), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("https://example.com/u".to_string())
            }
        });

        provider.get(false).await.unwrap();
        provider.get(true).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_deadline_triggers_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let provider = PresignedUrlProvider::new(Duration::from_millis(20), Duration::from_millis(0), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("https://example.com/u{n}"))
            }
        });

        let first = provider.get(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = provider.get(false).await.unwrap();
        assert_ne!(first, second);
    }
}
