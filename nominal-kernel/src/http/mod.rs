// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! HTTP Transport (component A): a pooled HTTPS client with retry-with-jitter,
//! gzip request encoding for non-streaming POSTs, and bearer-auth headers.

mod client;
mod middleware;
mod requests;
mod retry;

pub use client::{HttpClient, HttpClientConfig};
pub use middleware::{gzip_compress, CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF};
pub use retry::execute_with_retry;
