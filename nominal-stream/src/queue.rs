// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Bounded Queue (component E): single-producer/multi-consumer queue with
//! three overflow policies and explicit shutdown.

use std::collections::VecDeque;
use std::time::Duration;

use nominal_kernel::config::OverflowMode;
use nominal_kernel::error::{Error, Result};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// What `get` returned.
#[derive(Debug)]
pub enum Received<T> {
    /// An item was available.
    Item(T),
    /// The queue was shut down and is now empty; no more items will arrive.
    Shutdown,
    /// No item arrived before the timeout elapsed.
    TimedOut,
}

struct Inner<T> {
    items: VecDeque<T>,
    shutdown: bool,
    outstanding: usize,
}

/// A thread-safe queue with bounded capacity and a selectable overflow
/// policy. Capacity 0 means unbounded, in which case the overflow mode is
/// irrelevant.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    overflow_mode: OverflowMode,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> BoundedQueue<T> {
    /// Construct a queue with the given capacity (0 = unbounded) and
    /// overflow policy.
    pub fn new(capacity: usize, overflow_mode: OverflowMode) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                shutdown: false,
                outstanding: 0,
            }),
            capacity,
            overflow_mode,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    /// Push one item, applying the configured overflow policy if the queue
    /// is at capacity. Returns `Error::Shutdown` if the queue has already
    /// been shut down.
    pub async fn put(&self, item: T) -> Result<()> {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if guard.shutdown {
                    return Err(Error::Shutdown);
                }

                let at_capacity = self.capacity != 0 && guard.items.len() >= self.capacity;
                if !at_capacity {
                    guard.items.push_back(item);
                    guard.outstanding += 1;
                    self.not_empty.notify_one();
                    return Ok(());
                }

                match self.overflow_mode {
                    OverflowMode::Block => {
                        // fall through to wait below
                    }
                    OverflowMode::DropNewest => {
                        tracing::warn!("queue full, dropping newest item");
                        return Ok(());
                    }
                    OverflowMode::DropOldest => {
                        guard.items.pop_front();
                        guard.items.push_back(item);
                        self.not_empty.notify_one();
                        return Ok(());
                    }
                }
            }
            self.not_full.notified().await;
        }
    }

    /// Pop the next item, waiting up to `timeout` for one to arrive.
    /// Returns `Received::Shutdown` once the queue has been shut down and
    /// drained; `Received::TimedOut` if nothing arrived in time.
    pub async fn get(&self, timeout: Duration) -> Received<T> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(item) = guard.items.pop_front() {
                    self.not_full.notify_one();
                    return Received::Item(item);
                }
                if guard.shutdown {
                    return Received::Shutdown;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Received::TimedOut;
            }
            let remaining = deadline - now;
            tokio::select! {
                _ = self.not_empty.notified() => {}
                _ = tokio::time::sleep(remaining) => {
                    return Received::TimedOut;
                }
            }
        }
    }

    /// Mark one previously-received item as fully processed.
    pub async fn task_done(&self) {
        let mut guard = self.inner.lock().await;
        guard.outstanding = guard.outstanding.saturating_sub(1);
    }

    /// Current number of queued (not-yet-popped) items.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    /// Signal consumers that no more items will be pushed. Items already
    /// queued are still delivered by subsequent `get` calls; only once the
    /// queue is drained does `get` start returning `Shutdown`.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.shutdown = true;
        drop(guard);
        self.not_empty.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn block_mode_put_waits_for_capacity() {
        let queue = std::sync::Arc::new(BoundedQueue::new(1, OverflowMode::Block));
        queue.put(1).await.unwrap();

        let queue2 = queue.clone();
        let handle = tokio::spawn(async move {
            queue2.put(2).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        match queue.get(Duration::from_millis(10)).await {
            Received::Item(v) => assert_eq!(v, 1),
            _ => panic!("expected item"),
        }

        handle.await.unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn drop_newest_discards_incoming_item_when_full() {
        let queue = BoundedQueue::new(1, OverflowMode::DropNewest);
        queue.put(1).await.unwrap();
        queue.put(2).await.unwrap();
        assert_eq!(queue.len().await, 1);
        match queue.get(Duration::from_millis(10)).await {
            Received::Item(v) => assert_eq!(v, 1),
            _ => panic!("expected item"),
        }
    }

    #[tokio::test]
    async fn drop_oldest_evicts_the_oldest_item() {
        let queue = BoundedQueue::new(2, OverflowMode::DropOldest);
        queue.put(1).await.unwrap();
        queue.put(2).await.unwrap();
        queue.put(3).await.unwrap();
        assert_eq!(queue.len().await, 2);

        let mut seen = Vec::new();
        while let Received::Item(v) = queue.get(Duration::from_millis(10)).await {
            seen.push(v);
        }
        assert_eq!(seen, vec![2, 3]);
    }

    #[tokio::test]
    async fn get_times_out_when_empty() {
        let queue: BoundedQueue<i32> = BoundedQueue::new(0, OverflowMode::Block);
        match queue.get(Duration::from_millis(5)).await {
            Received::TimedOut => {}
            _ => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn shutdown_drains_then_reports_shutdown() {
        let queue = BoundedQueue::new(0, OverflowMode::Block);
        queue.put(1).await.unwrap();
        queue.shutdown().await;

        match queue.get(Duration::from_millis(10)).await {
            Received::Item(v) => assert_eq!(v, 1),
            _ => panic!("expected the queued item before shutdown"),
        }
        match queue.get(Duration::from_millis(10)).await {
            Received::Shutdown => {}
            _ => panic!("expected shutdown after drain"),
        }
    }

    #[tokio::test]
    async fn put_after_shutdown_is_rejected() {
        let queue = BoundedQueue::new(0, OverflowMode::Block);
        queue.shutdown().await;
        assert!(matches!(queue.put(1).await, Err(Error::Shutdown)));
    }
}
