// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Stream Orchestrator (component I): wires the bounded queue, batcher,
//! serializer pool, and writer pool together behind `enqueue`/`close`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use nominal_kernel::config::StreamConfig;
use nominal_kernel::error::{Error, Result};
use nominal_kernel::http::HttpClient;
use nominal_kernel::value::{BatchItem, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::batch::run_batcher;
use crate::queue::BoundedQueue;
use crate::serializer::run_serializer;
use crate::sink::{fallback_closure, FileSink};
use crate::writer::run_writer;

/// Accepted forms for an `enqueue` timestamp, all normalized to nanoseconds
/// since the Unix epoch before reaching the queue.
pub enum Timestamp {
    /// Already nanoseconds since the epoch.
    Nanos(i64),
    /// An absolute wall-clock instant.
    Absolute(SystemTime),
    /// An RFC 3339 / ISO-8601 timestamp string.
    Iso8601(String),
}

impl Timestamp {
    fn normalize(self) -> Result<i64> {
        match self {
            Timestamp::Nanos(ns) => Ok(ns),
            Timestamp::Absolute(t) => {
                let dur = t
                    .duration_since(UNIX_EPOCH)
                    .map_err(|_| Error::config("absolute timestamp precedes the Unix epoch"))?;
                Ok(dur.as_nanos() as i64)
            }
            Timestamp::Iso8601(s) => {
                let parsed = DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| Error::config(format!("invalid ISO-8601 timestamp '{s}': {e}")))?
                    .with_timezone(&Utc);
                parsed.timestamp_nanos_opt().ok_or_else(|| Error::config("timestamp out of range"))
            }
        }
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// The running streaming write pipeline for one data source. Constructed
/// by [`StreamOrchestrator::start`]; call [`StreamOrchestrator::close`] once
/// before dropping to flush cleanly.
pub struct StreamOrchestrator {
    queue: Arc<BoundedQueue<BatchItem>>,
    batcher: JoinHandle<()>,
    serializers: Vec<JoinHandle<()>>,
    writers: Vec<JoinHandle<()>>,
    track_metrics: bool,
}

impl StreamOrchestrator {
    /// Start the pipeline: one batcher task, `config.stream.serializer_workers`
    /// serializer tasks, and `config.stream.writer_workers` writer tasks, all
    /// writing to `{base_url}/storage/writer/v1/nominal/{data_source_rid}`
    /// (or the legacy path if `legacy` is set).
    pub fn start(client: Arc<HttpClient>, base_url: &str, data_source_rid: &str, config: &StreamConfig, legacy: bool) -> Self {
        let queue = Arc::new(BoundedQueue::new(config.max_queue_size, config.overflow_mode));
        let metrics_queue = if config.track_metrics { Some(queue.clone()) } else { None };

        let url = if legacy {
            crate::writer::prometheus_write_url(base_url, data_source_rid)
        } else {
            crate::writer::nominal_write_url(base_url, data_source_rid)
        };

        let (batch_tx, batch_rx) = mpsc::channel(config.serializer_workers.max(1) * 2);
        let batch_rx = Arc::new(Mutex::new(batch_rx));

        let (serialized_tx, serialized_rx) = mpsc::channel(config.writer_workers.max(1) * 2);
        let serialized_rx = Arc::new(Mutex::new(serialized_rx));

        let batcher = tokio::spawn(run_batcher(queue.clone(), config.max_batch_size, config.max_wait, batch_tx));

        let mut serializers = Vec::with_capacity(config.serializer_workers);
        for _ in 0..config.serializer_workers.max(1) {
            let batch_rx = batch_rx.clone();
            let serialized_tx = serialized_tx.clone();
            serializers.push(tokio::spawn(run_serializer(batch_rx, serialized_tx)));
        }
        drop(serialized_tx);

        let fallback = config.file_fallback_path.clone().map(|path| Arc::new(FileSink::new(path)));

        let mut writers = Vec::with_capacity(config.writer_workers);
        for _ in 0..config.writer_workers.max(1) {
            let serialized_rx = serialized_rx.clone();
            let client = client.clone();
            let url = url.clone();
            let track_metrics = config.track_metrics;
            let metrics_queue = metrics_queue.clone();
            let handle = match &fallback {
                Some(sink) => {
                    let on_failure = fallback_closure(sink.clone());
                    tokio::spawn(run_writer(serialized_rx, client, url, track_metrics, metrics_queue, on_failure))
                }
                None => tokio::spawn(crate::writer::run_writer_no_fallback(
                    serialized_rx,
                    client,
                    url,
                    track_metrics,
                    metrics_queue,
                )),
            };
            writers.push(handle);
        }

        Self {
            queue,
            batcher,
            serializers,
            writers,
            track_metrics: config.track_metrics,
        }
    }

    /// Push one item onto the pipeline. Blocks if the queue is full under
    /// `OverflowMode::Block`; never blocks otherwise.
    pub async fn enqueue(
        &self,
        channel: impl Into<String>,
        timestamp: Timestamp,
        value: impl Into<Value>,
        tags: BTreeMap<String, String>,
    ) -> Result<()> {
        let ns = timestamp.normalize()?;
        let item = BatchItem::new(channel, ns, value, tags)?;
        self.queue.put(item).await
    }

    /// Convenience for enqueuing equal-length parallel arrays of timestamps
    /// and values onto one channel.
    pub async fn enqueue_batch(
        &self,
        channel: impl Into<String>,
        timestamps: Vec<Timestamp>,
        values: Vec<Value>,
        tags: BTreeMap<String, String>,
    ) -> Result<()> {
        if timestamps.len() != values.len() {
            return Err(Error::config("timestamps and values must have equal length"));
        }
        let channel = channel.into();
        for (ts, value) in timestamps.into_iter().zip(values) {
            let ns = ts.normalize()?;
            let item = BatchItem::new(channel.clone(), ns, value, tags.clone())?;
            self.queue.put(item).await?;
        }
        Ok(())
    }

    /// Enqueue one timestamp across many channels, recording
    /// `enque_dict_start_staleness` / `enque_dict_end_staleness` metrics
    /// (elapsed wall-clock seconds since the call began) when metrics
    /// tracking is enabled.
    pub async fn enqueue_from_dict(&self, timestamp: Timestamp, values: BTreeMap<String, Value>) -> Result<()> {
        let ns = timestamp.normalize()?;
        let call_start = Instant::now();
        let mut first_staleness = None;
        let mut last_staleness = None;

        for (channel, value) in values {
            let item = BatchItem::new(channel, ns, value, BTreeMap::new())?;
            self.queue.put(item).await?;
            let elapsed = call_start.elapsed().as_secs_f64();
            first_staleness.get_or_insert(elapsed);
            last_staleness = Some(elapsed);
        }

        if self.track_metrics {
            let now = now_ns();
            if let Some(first) = first_staleness {
                let _ = self
                    .queue
                    .put(BatchItem::new_metric("enque_dict_start_staleness", now, first))
                    .await;
            }
            if let Some(last) = last_staleness {
                let _ = self
                    .queue
                    .put(BatchItem::new_metric("enque_dict_end_staleness", now, last))
                    .await;
            }
        }

        Ok(())
    }

    /// Shut down the pipeline. With `wait = true`, signals the queue and
    /// waits for the batcher, serializer pool, and writer pool to drain in
    /// order. With `wait = false`, aborts every task immediately.
    pub async fn close(self, wait: bool) -> Result<()> {
        self.queue.shutdown().await;

        if !wait {
            self.batcher.abort();
            for handle in self.serializers {
                handle.abort();
            }
            for handle in self.writers {
                handle.abort();
            }
            return Ok(());
        }

        let _ = self.batcher.await;
        for handle in self.serializers {
            let _ = handle.await;
        }
        for handle in self.writers {
            let _ = handle.await;
        }
        Ok(())
    }
}
