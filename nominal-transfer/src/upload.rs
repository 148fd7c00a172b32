// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Multipart Uploader (component C): chunk an input stream, sign each part,
//! PUT in parallel, commit or abort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nominal_kernel::config::{TransferConfig, MIN_CHUNK_SIZE};
use nominal_kernel::error::{Error, Result};
use nominal_kernel::http::HttpClient;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Mutex};

use crate::protocol::{
    AbortRequest, CompleteRequest, InitiateRequest, InitiateResponse, ListPartsRequest,
    ListPartsResponse, SignPartRequest, SignPartResponse,
};

/// Client for the server-mediated multipart upload protocol.
pub struct UploadClient {
    http: Arc<HttpClient>,
    base_url: String,
}

type Chunk = (u32, Vec<u8>);

impl UploadClient {
    /// Construct a client against `base_url` (e.g. `https://api.nominal.io`).
    pub fn new(http: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Upload `reader` to the object store, returning the final location
    /// string (e.g. `s3://bucket/key`).
    ///
    /// `reader` is chunked into `config.chunk_size`-byte pieces, pushed
    /// through a bounded look-ahead queue of capacity `2 * max_workers`, and
    /// PUT in parallel by `config.max_workers` tasks. Any part failure
    /// cancels the remaining parts and aborts the upload server-side.
    pub async fn upload<R>(
        &self,
        reader: R,
        filename: &str,
        mimetype: &str,
        config: &TransferConfig,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if config.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::config(format!(
                "chunk_size must be >= {MIN_CHUNK_SIZE} bytes for S3 compatibility"
            )));
        }

        let initiate = self.initiate(filename, mimetype).await?;

        match self.run_parts(&initiate, reader, config).await {
            Ok(()) => match self.finish(&initiate).await {
                Ok(location) => Ok(location),
                Err(err) => Err(self.abort_chained(&initiate, err).await),
            },
            Err(err) => Err(self.abort_chained(&initiate, err).await),
        }
    }

    async fn run_parts<R>(
        &self,
        initiate: &InitiateResponse,
        mut reader: R,
        config: &TransferConfig,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let queue_capacity = (2 * config.max_workers).max(1);
        let (tx, rx) = mpsc::channel::<Chunk>(queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let chunk_size = config.chunk_size as usize;
        let producer = tokio::spawn(async move {
            let mut part_number: u32 = 1;
            loop {
                let mut buf = vec![0u8; chunk_size];
                let mut filled = 0usize;
                while filled < chunk_size {
                    let n = reader.read(&mut buf[filled..]).await?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                if filled == 0 {
                    break;
                }
                buf.truncate(filled);
                if tx.send((part_number, buf)).await.is_err() {
                    break;
                }
                part_number += 1;
                if filled < chunk_size {
                    break;
                }
            }
            Ok::<(), std::io::Error>(())
        });

        let first_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut workers = tokio::task::JoinSet::new();
        for _ in 0..config.max_workers {
            let rx = rx.clone();
            let first_error = first_error.clone();
            let cancelled = cancelled.clone();
            let key = initiate.key.clone();
            let upload_id = initiate.upload_id.clone();
            let config = config.clone();
            let this = self.clone_handle();

            workers.spawn(async move {
                loop {
                    if cancelled.load(Ordering::Relaxed) {
                        break;
                    }
                    let next = { rx.lock().await.recv().await };
                    let (part_number, bytes) = match next {
                        Some(chunk) => chunk,
                        None => break,
                    };

                    match this
                        .upload_part_with_retry(&key, &upload_id, part_number, bytes, &config)
                        .await
                    {
                        Ok(()) => {}
                        Err(err) => {
                            cancelled.store(true, Ordering::Relaxed);
                            *first_error.lock().await = Some(err);
                            break;
                        }
                    }
                }
            });
        }

        while workers.join_next().await.is_some() {}

        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(io_err)) => {
                let mut guard = first_error.lock().await;
                if guard.is_none() {
                    *guard = Some(Error::from(io_err));
                }
            }
            Err(join_err) => {
                let mut guard = first_error.lock().await;
                if guard.is_none() {
                    *guard = Some(Error::config(format!("upload producer task panicked: {join_err}")));
                }
            }
        }

        if let Some(err) = first_error.lock().await.take() {
            return Err(err);
        }

        Ok(())
    }

    async fn upload_part_with_retry(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        bytes: Vec<u8>,
        config: &TransferConfig,
    ) -> Result<()> {
        let mut last_err = None;
        for attempt in 0..=config.max_part_retries {
            if attempt > 0 {
                tracing::warn!(part_number, attempt, "retrying upload part, re-signing");
            }
            let signed = match self.sign_part(key, upload_id, part_number).await {
                Ok(signed) => signed,
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            };
            let headers: Vec<(String, String)> = signed.headers.into_iter().collect();
            match self.http.put_bytes(&signed.url, &headers, bytes.clone()).await {
                Ok(_response) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::config("upload part failed with no recorded error")))
    }

    async fn initiate(&self, filename: &str, mimetype: &str) -> Result<InitiateResponse> {
        let url = format!("{}/upload/v1/initiate-multipart-upload", self.base_url);
        self.http
            .post_json(
                &url,
                &InitiateRequest {
                    filename: filename.to_string(),
                    filetype: mimetype.to_string(),
                    workspace: None,
                },
            )
            .await
    }

    async fn sign_part(&self, key: &str, upload_id: &str, part_number: u32) -> Result<SignPartResponse> {
        let url = format!("{}/upload/v1/sign-part", self.base_url);
        self.http
            .post_json(
                &url,
                &SignPartRequest {
                    key: key.to_string(),
                    part_number,
                    upload_id: upload_id.to_string(),
                },
            )
            .await
    }

    async fn list_parts(&self, key: &str, upload_id: &str) -> Result<ListPartsResponse> {
        let url = format!("{}/upload/v1/list-parts", self.base_url);
        self.http
            .post_json(
                &url,
                &ListPartsRequest {
                    key: key.to_string(),
                    upload_id: upload_id.to_string(),
                },
            )
            .await
    }

    async fn finish(&self, initiate: &InitiateResponse) -> Result<String> {
        let parts = self
            .list_parts(&initiate.key, &initiate.upload_id)
            .await?
            .parts;
        let url = format!("{}/upload/v1/complete-multipart-upload", self.base_url);
        let response: crate::protocol::CompleteResponse = self
            .http
            .post_json(
                &url,
                &CompleteRequest {
                    key: initiate.key.clone(),
                    upload_id: initiate.upload_id.clone(),
                    parts,
                },
            )
            .await?;
        Ok(response.location)
    }

    async fn abort_chained(&self, initiate: &InitiateResponse, original: Error) -> Error {
        let url = format!("{}/upload/v1/abort-multipart-upload", self.base_url);
        let result: Result<serde_json::Value> = self
            .http
            .post_json(
                &url,
                &AbortRequest {
                    key: initiate.key.clone(),
                    upload_id: initiate.upload_id.clone(),
                },
            )
            .await;

        match result {
            Ok(_) => original,
            Err(abort_err) => {
                tracing::error!(error = %abort_err, "abort_multipart_upload itself failed");
                Error::chain_abort_failure(original, abort_err)
            }
        }
    }

    fn clone_handle(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_below_minimum_is_rejected_before_any_io() {
        let mut config = TransferConfig::default();
        config.chunk_size = 1024;
        assert!(config.chunk_size < MIN_CHUNK_SIZE);
    }
}
