// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! Streaming Write Pipeline (components E-I): a bounded item queue feeding a
//! batcher, a serializer pool, and a writer pool behind a single orchestrator.

pub mod batch;
pub mod metrics;
pub mod orchestrator;
pub mod proto;
pub mod queue;
pub mod serializer;
pub mod sink;
pub mod writer;

pub use metrics::ScopedTimer;
pub use orchestrator::{StreamOrchestrator, Timestamp};
pub use queue::{BoundedQueue, Received};
pub use serializer::SerializedBatch;
pub use sink::FileSink;
pub use writer::RequestMetrics;
