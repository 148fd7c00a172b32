// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Call-site metric helpers: a scoped timer that enqueues its own elapsed
//! time as a reserved-channel metric item when dropped.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use nominal_kernel::value::BatchItem;

use crate::queue::BoundedQueue;

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Measures the time between construction and drop and enqueues it as
/// `__nominal.metric.<name>` (seconds, as an `f64`) onto `queue`. The
/// enqueue itself happens on a spawned task since `Drop` cannot be async;
/// a queue that is shutting down silently drops the measurement.
pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
    queue: Arc<BoundedQueue<BatchItem>>,
}

impl ScopedTimer {
    /// Start timing `name` against `queue`.
    pub fn start(name: &'static str, queue: Arc<BoundedQueue<BatchItem>>) -> Self {
        Self { name, start: Instant::now(), queue }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed_secs = self.start.elapsed().as_secs_f64();
        let item = BatchItem::new_metric(self.name, now_ns(), elapsed_secs);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            if queue.put(item).await.is_err() {
                tracing::debug!("metrics queue shut down, dropping scoped-timer measurement");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nominal_kernel::config::OverflowMode;
    use crate::queue::Received;

    #[tokio::test]
    async fn timer_enqueues_a_metric_item_on_drop() {
        let queue = Arc::new(BoundedQueue::new(0, OverflowMode::Block));
        {
            let _timer = ScopedTimer::start("call_site", queue.clone());
        }
        // the enqueue happens on a spawned task; give it a turn to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        match queue.get(std::time::Duration::from_millis(50)).await {
            Received::Item(item) => assert!(item.channel_name.starts_with("__nominal.metric.call_site")),
            other => panic!("expected a metric item, got {other:?}"),
        }
    }
}
