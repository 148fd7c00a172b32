// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! Client-side ingestion and streaming library for the Nominal time-series
//! platform: multipart upload/download of large binary objects, plus a
//! bounded, backpressured streaming write pipeline for telemetry samples.
//!
//! This crate is a thin facade over three libraries that can also be used
//! independently:
//! - [`nominal_kernel`] — HTTP transport, configuration, error taxonomy,
//!   logging, presigned-URL cache, and the telemetry value model.
//! - [`nominal_transfer`] — the multipart uploader and downloader.
//! - [`nominal_stream`] — the streaming write pipeline.

pub use nominal_kernel;
pub use nominal_stream;
pub use nominal_transfer;

pub use nominal_kernel::{Config, Error, HttpClient, HttpClientConfig, OverflowMode, Result};
pub use nominal_stream::{ScopedTimer, StreamOrchestrator, Timestamp};
pub use nominal_transfer::{DownloadClient, DownloadItem, DownloadResults, UploadClient};
