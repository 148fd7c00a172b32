// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! Minimal trusted core shared by the transfer and streaming crates: HTTP
//! transport, error taxonomy, configuration, logging, the presigned-URL
//! cache, and the telemetry value model.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod presign;
pub mod value;

pub use config::{Config, OverflowMode, StreamConfig, TransferConfig};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpClientConfig};
pub use presign::PresignedUrlProvider;
pub use value::{Batch, BatchItem, Value, ValueTypeTag, METRIC_CHANNEL_PREFIX};
