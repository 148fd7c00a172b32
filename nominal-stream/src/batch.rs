// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Batcher (component F): accumulates items popped off the bounded queue
//! into size- or time-bounded batches.

use std::sync::Arc;
use std::time::Duration;

use nominal_kernel::value::{Batch, BatchItem};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::queue::{BoundedQueue, Received};

/// Pulls items off `queue` and emits a [`Batch`] on `batch_tx` whenever the
/// buffer reaches `max_batch_size` items or the next scheduled emit time
/// (a clock that ticks every `max_wait` regardless of buffer occupancy) has
/// passed, whichever comes first. On shutdown, any partially filled buffer
/// is flushed as a final batch before returning.
pub async fn run_batcher(
    queue: Arc<BoundedQueue<BatchItem>>,
    max_batch_size: usize,
    max_wait: Duration,
    batch_tx: mpsc::Sender<Batch>,
) {
    let mut buffer: Vec<BatchItem> = Vec::new();
    let mut next_emit_time = Instant::now() + max_wait;

    loop {
        let wait = next_emit_time.saturating_duration_since(Instant::now());

        match queue.get(wait).await {
            Received::Item(item) => {
                buffer.push(item);
                queue.task_done().await;

                if buffer.len() >= max_batch_size {
                    flush(&mut buffer, &batch_tx).await;
                    next_emit_time = Instant::now() + max_wait;
                }
            }
            Received::TimedOut => {
                if !buffer.is_empty() {
                    flush(&mut buffer, &batch_tx).await;
                }
                next_emit_time += max_wait;
            }
            Received::Shutdown => {
                if !buffer.is_empty() {
                    flush(&mut buffer, &batch_tx).await;
                }
                tracing::debug!("batcher observed shutdown, exiting");
                return;
            }
        }
    }
}

async fn flush(buffer: &mut Vec<BatchItem>, batch_tx: &mpsc::Sender<Batch>) {
    let items = std::mem::take(buffer);
    match Batch::new(items) {
        Ok(batch) => {
            if batch_tx.send(batch).await.is_err() {
                tracing::warn!("batch receiver dropped; discarding batch");
            }
        }
        Err(err) => {
            // `Batch::new` only fails on an empty vec, which `flush` never calls with.
            tracing::error!(%err, "unexpected empty batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nominal_kernel::config::OverflowMode;
    use std::collections::BTreeMap;

    fn item(ts: i64) -> BatchItem {
        BatchItem::new("c", ts, 1.0, BTreeMap::new()).unwrap()
    }

    #[tokio::test]
    async fn flushes_on_size_threshold() {
        let queue = Arc::new(BoundedQueue::new(0, OverflowMode::Block));
        let (tx, mut rx) = mpsc::channel(8);

        for i in 0..3 {
            queue.put(item(i)).await.unwrap();
        }
        let queue_clone = queue.clone();
        let handle = tokio::spawn(async move {
            run_batcher(queue_clone, 3, Duration::from_secs(60), tx).await;
        });

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.items.len(), 3);

        queue.shutdown().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn flushes_on_timeout_with_partial_buffer() {
        let queue = Arc::new(BoundedQueue::new(0, OverflowMode::Block));
        let (tx, mut rx) = mpsc::channel(8);

        queue.put(item(0)).await.unwrap();
        let queue_clone = queue.clone();
        let handle = tokio::spawn(async move {
            run_batcher(queue_clone, 1000, Duration::from_millis(20), tx).await;
        });

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.items.len(), 1);

        queue.shutdown().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn emit_clock_keeps_ticking_while_buffer_is_idle() {
        let queue = Arc::new(BoundedQueue::new(0, OverflowMode::Block));
        let (tx, mut rx) = mpsc::channel(8);

        let queue_clone = queue.clone();
        let handle = tokio::spawn(async move {
            run_batcher(queue_clone, 1000, Duration::from_millis(100), tx).await;
        });

        // An item arriving partway through an already-ticking window must
        // not push the flush back out to a fresh window starting from its
        // own arrival time.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let start = Instant::now();
        queue.put(item(0)).await.unwrap();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.items.len(), 1);
        assert!(
            start.elapsed() < Duration::from_millis(100),
            "flush should land on the original window boundary, not a new one started at item arrival"
        );

        queue.shutdown().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn flushes_final_partial_batch_on_shutdown() {
        let queue = Arc::new(BoundedQueue::new(0, OverflowMode::Block));
        let (tx, mut rx) = mpsc::channel(8);

        queue.put(item(0)).await.unwrap();
        queue.put(item(1)).await.unwrap();
        queue.shutdown().await;

        run_batcher(queue, 1000, Duration::from_secs(60), tx).await;

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.items.len(), 2);
        assert!(rx.recv().await.is_none() || rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_with_empty_buffer_emits_nothing() {
        let queue: Arc<BoundedQueue<BatchItem>> = Arc::new(BoundedQueue::new(0, OverflowMode::Block));
        queue.shutdown().await;
        let (tx, mut rx) = mpsc::channel(8);

        run_batcher(queue, 1000, Duration::from_secs(60), tx).await;
        assert!(rx.try_recv().is_err());
    }
}
