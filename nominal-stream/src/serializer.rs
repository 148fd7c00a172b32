// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Serializer Pool (component G): groups each batch's items into wire
//! series and encodes them to the protobuf write request.

use std::sync::Arc;

use nominal_kernel::value::Batch;
use prost::Message;
use tokio::sync::{mpsc, Mutex};

use crate::proto::encode_batch;

/// A batch that has been grouped and protobuf-encoded, ready for the
/// writer pool. Carries the timestamp bounds through so the writer can
/// compute latency metrics without re-inspecting the original items.
#[derive(Debug, Clone)]
pub struct SerializedBatch {
    /// Encoded `WriteRequestNominal` bytes.
    pub bytes: Vec<u8>,
    /// Number of items this batch contained.
    pub item_count: usize,
    /// Minimum timestamp across the batch's items, in nanoseconds.
    pub oldest_timestamp: i64,
    /// Maximum timestamp across the batch's items, in nanoseconds.
    pub newest_timestamp: i64,
    /// True if every item in this batch is a writer-pool latency metric.
    pub is_metrics_only: bool,
}

/// Pull batches off the shared receiver and push serialized batches onto
/// `out_tx` until the receiver is closed and drained. Multiple workers may
/// share one `batch_rx`, matching the serializer-worker pool sizing.
pub async fn run_serializer(batch_rx: Arc<Mutex<mpsc::Receiver<Batch>>>, out_tx: mpsc::Sender<SerializedBatch>) {
    loop {
        let batch = {
            let mut rx = batch_rx.lock().await;
            rx.recv().await
        };
        let Some(batch) = batch else {
            tracing::debug!("serializer observed closed batch channel, exiting");
            return;
        };

        let item_count = batch.items.len();
        let oldest_timestamp = batch.oldest_timestamp;
        let newest_timestamp = batch.newest_timestamp;
        let is_metrics_only = batch.is_metrics_only();
        let request = encode_batch(&batch);
        let bytes = request.encode_to_vec();

        let serialized = SerializedBatch {
            bytes,
            item_count,
            oldest_timestamp,
            newest_timestamp,
            is_metrics_only,
        };
        if out_tx.send(serialized).await.is_err() {
            tracing::warn!("writer pool channel closed; dropping serialized batch");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nominal_kernel::value::BatchItem;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn serializes_and_forwards_a_batch() {
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let batch_rx = Arc::new(Mutex::new(batch_rx));

        let item = BatchItem::new("c", 5, 1.0, BTreeMap::new()).unwrap();
        batch_tx.send(Batch::new(vec![item]).unwrap()).await.unwrap();
        drop(batch_tx);

        run_serializer(batch_rx, out_tx).await;

        let serialized = out_rx.recv().await.unwrap();
        assert_eq!(serialized.item_count, 1);
        assert_eq!(serialized.oldest_timestamp, 5);
        assert!(!serialized.bytes.is_empty());
    }

    #[tokio::test]
    async fn exits_once_batch_channel_is_closed() {
        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(4);
        let (out_tx, _out_rx) = mpsc::channel(4);
        drop(batch_tx);

        run_serializer(Arc::new(Mutex::new(batch_rx)), out_tx).await;
    }
}
