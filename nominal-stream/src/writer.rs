// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Writer Pool (component H): POSTs serialized batches to the channel-writer
//! endpoint and derives per-request latency metrics.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use nominal_kernel::error::Result;
use nominal_kernel::http::HttpClient;
use nominal_kernel::value::BatchItem;
use tokio::sync::{mpsc, Mutex};

use crate::queue::BoundedQueue;
use crate::serializer::SerializedBatch;

/// Latency measurements for one write, matching the formulas of the system
/// this pipeline replaces: each is a delta in seconds between a wall-clock
/// instant and one of the batch's timestamp extremes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestMetrics {
    /// (request start - oldest item timestamp) / 1e9
    pub largest_latency_before_request: f64,
    /// (request start - newest item timestamp) / 1e9
    pub smallest_latency_before_request: f64,
    /// (request end - request start) / 1e9
    pub request_rtt: f64,
    /// (request end - oldest item timestamp) / 1e9
    pub largest_latency_after_request: f64,
    /// (request end - newest item timestamp) / 1e9
    pub smallest_latency_after_request: f64,
}

impl RequestMetrics {
    fn compute(before_req: i64, after_req: i64, oldest_timestamp: i64, newest_timestamp: i64) -> Self {
        Self {
            largest_latency_before_request: (before_req - oldest_timestamp) as f64 / 1e9,
            smallest_latency_before_request: (before_req - newest_timestamp) as f64 / 1e9,
            request_rtt: (after_req - before_req) as f64 / 1e9,
            largest_latency_after_request: (after_req - oldest_timestamp) as f64 / 1e9,
            smallest_latency_after_request: (after_req - newest_timestamp) as f64 / 1e9,
        }
    }

    /// Recast as metric `BatchItem`s under the reserved channel prefix, for
    /// re-enqueuing when `track_metrics` is enabled.
    fn as_batch_items(&self, now_ns: i64) -> Vec<BatchItem> {
        vec![
            BatchItem::new_metric("largest_latency_before_request", now_ns, self.largest_latency_before_request),
            BatchItem::new_metric("smallest_latency_before_request", now_ns, self.smallest_latency_before_request),
            BatchItem::new_metric("request_rtt", now_ns, self.request_rtt),
            BatchItem::new_metric("largest_latency_after_request", now_ns, self.largest_latency_after_request),
            BatchItem::new_metric("smallest_latency_after_request", now_ns, self.smallest_latency_after_request),
        ]
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Pull serialized batches off the shared receiver and POST each to `url`.
/// On success, if `track_metrics` is set and the batch wasn't itself a
/// metrics-only batch, the five latency metrics are re-enqueued onto
/// `metrics_queue`. On failure, the batch is handed to `on_failure` (the
/// file-sink fallback, or a no-op that just logs).
pub async fn run_writer<F>(
    batch_rx: Arc<Mutex<mpsc::Receiver<SerializedBatch>>>,
    client: Arc<HttpClient>,
    url: String,
    track_metrics: bool,
    metrics_queue: Option<Arc<BoundedQueue<BatchItem>>>,
    mut on_failure: F,
) where
    F: FnMut(SerializedBatch),
{
    loop {
        let batch = {
            let mut rx = batch_rx.lock().await;
            rx.recv().await
        };
        let Some(batch) = batch else {
            tracing::debug!("writer observed closed serializer channel, exiting");
            return;
        };

        let before_req = now_ns();
        let result = client.post_protobuf(&url, batch.bytes.clone()).await;
        let after_req = now_ns();

        match result {
            Ok(()) => {
                if track_metrics && !batch.is_metrics_only {
                    if let Some(queue) = &metrics_queue {
                        let metrics =
                            RequestMetrics::compute(before_req, after_req, batch.oldest_timestamp, batch.newest_timestamp);
                        for item in metrics.as_batch_items(after_req) {
                            if queue.put(item).await.is_err() {
                                tracing::debug!("metrics queue shut down, dropping latency metrics");
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, item_count = batch.item_count, "write failed, handing off to fallback");
                on_failure(batch);
            }
        }
    }
}

/// Convenience wrapper for `run_writer` that ignores failed batches beyond
/// logging, for callers with no file-sink configured.
pub async fn run_writer_no_fallback(
    batch_rx: Arc<Mutex<mpsc::Receiver<SerializedBatch>>>,
    client: Arc<HttpClient>,
    url: String,
    track_metrics: bool,
    metrics_queue: Option<Arc<BoundedQueue<BatchItem>>>,
) {
    run_writer(batch_rx, client, url, track_metrics, metrics_queue, |batch| {
        tracing::error!(item_count = batch.item_count, "batch dropped, no fallback sink configured");
    })
    .await
}

/// Build the channel-writer URL for the primary (columnar) format.
pub fn nominal_write_url(base_url: &str, data_source_rid: &str) -> String {
    format!("{base_url}/storage/writer/v1/nominal/{data_source_rid}")
}

/// Build the legacy row-oriented (Prometheus-compatible) channel-writer URL.
/// Same pipeline and bytes as [`nominal_write_url`]; only the path differs.
pub fn prometheus_write_url(base_url: &str, data_source_rid: &str) -> String {
    format!("{base_url}/storage/writer/v1/prometheus/{data_source_rid}")
}
