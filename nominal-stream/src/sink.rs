// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! File-sink fallback: batches the writer pool could not deliver are
//! appended, one JSON line per batch, to a configured file instead of being
//! silently dropped.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::serializer::SerializedBatch;

#[derive(Serialize)]
struct SunkBatch {
    item_count: usize,
    oldest_timestamp: i64,
    newest_timestamp: i64,
    protobuf_base64: String,
}

/// Appends failed batches to a file as newline-delimited JSON. Shared
/// across writer-pool tasks behind an `Arc<Mutex<_>>` since appends must be
/// serialized to keep each line intact.
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    /// Construct a sink writing to `path`. The file is created (and any
    /// parent directories are assumed to already exist) on first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    /// Append one batch as a JSON line. Logs and swallows I/O errors: the
    /// fallback sink is a best-effort safety net, not a guaranteed-durable
    /// store, and a broken sink must not take down the writer pool.
    pub async fn write(&self, batch: &SerializedBatch) {
        let _guard = self.lock.lock().await;

        let record = SunkBatch {
            item_count: batch.item_count,
            oldest_timestamp: batch.oldest_timestamp,
            newest_timestamp: batch.newest_timestamp,
            protobuf_base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &batch.bytes),
        };

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(%err, "failed to serialize sunk batch, dropping");
                return;
            }
        };

        let file = OpenOptions::new().create(true).append(true).open(&self.path).await;
        let mut file = match file {
            Ok(f) => f,
            Err(err) => {
                tracing::error!(%err, path = %self.path.display(), "failed to open file sink, dropping batch");
                return;
            }
        };

        if let Err(err) = file.write_all(format!("{line}\n").as_bytes()).await {
            tracing::error!(%err, path = %self.path.display(), "failed to append to file sink, dropping batch");
        }
    }
}

/// Build an `on_failure` closure for [`crate::writer::run_writer`] backed
/// by a file sink, dispatching each write onto the current runtime so the
/// writer loop itself stays synchronous.
pub fn fallback_closure(sink: Arc<FileSink>) -> impl FnMut(SerializedBatch) {
    move |batch| {
        let sink = sink.clone();
        tokio::spawn(async move {
            sink.write(&batch).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nominal_kernel::value::{Batch, BatchItem};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn writes_one_line_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.jsonl");
        let sink = FileSink::new(path.clone());

        let item = BatchItem::new("c", 1, 1.0, BTreeMap::new()).unwrap();
        let batch = Batch::new(vec![item]).unwrap();
        let serialized = SerializedBatch {
            bytes: prost::Message::encode_to_vec(&crate::proto::encode_batch(&batch)),
            item_count: 1,
            oldest_timestamp: 1,
            newest_timestamp: 1,
            is_metrics_only: false,
        };
        sink.write(&serialized).await;
        sink.write(&serialized).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
