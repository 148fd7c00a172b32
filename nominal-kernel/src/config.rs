// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Environment-driven configuration for the ingestion/streaming core.
//!
//! Every knob has a typed field with a `Default` matching the documented
//! default, overridable by an environment variable. Precedence is: explicit
//! constructor argument, then environment variable, then default — the same
//! order used throughout this codebase.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::HttpClientConfig;

/// Overflow policy for the bounded item queue (component E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    /// `put` blocks until capacity is available.
    #[default]
    Block,
    /// `put` discards the arriving item when full.
    DropNewest,
    /// `put` evicts the oldest queued item to make room.
    DropOldest,
}

impl std::str::FromStr for OverflowMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "block" => Ok(OverflowMode::Block),
            "drop_newest" => Ok(OverflowMode::DropNewest),
            "drop_oldest" => Ok(OverflowMode::DropOldest),
            other => Err(Error::config(format!("invalid overflow_mode: {other}"))),
        }
    }
}

/// Configuration for the streaming write pipeline (components E-I).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Flush a batch once it holds this many items. Default 50 000.
    pub max_batch_size: usize,
    /// Flush a batch after this much time has elapsed since the last flush. Default 1s.
    pub max_wait: Duration,
    /// Item-queue capacity; 0 means unbounded.
    pub max_queue_size: usize,
    /// Overflow policy applied when the item queue is full.
    pub overflow_mode: OverflowMode,
    /// Parallel serializer task count.
    pub serializer_workers: usize,
    /// Parallel writer task count.
    pub writer_workers: usize,
    /// Optional filesystem sink for items that cannot be delivered.
    pub file_fallback_path: Option<PathBuf>,
    /// If true, re-enqueue writer latency metrics under `__nominal.metric.*`.
    pub track_metrics: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50_000,
            max_wait: Duration::from_secs(1),
            max_queue_size: 0,
            overflow_mode: OverflowMode::Block,
            serializer_workers: num_cpus(),
            writer_workers: 10,
            file_fallback_path: None,
            track_metrics: false,
        }
    }
}

impl StreamConfig {
    /// Load overrides from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var("NOMINAL_MAX_BATCH_SIZE") {
            config.max_batch_size = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_MAX_BATCH_SIZE must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_MAX_WAIT_MS") {
            let ms: u64 = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_MAX_WAIT_MS must be an integer"))?;
            config.max_wait = Duration::from_millis(ms);
        }
        if let Ok(v) = env::var("NOMINAL_MAX_QUEUE_SIZE") {
            config.max_queue_size = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_MAX_QUEUE_SIZE must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_OVERFLOW_MODE") {
            config.overflow_mode = v.parse()?;
        }
        if let Ok(v) = env::var("NOMINAL_SERIALIZER_WORKERS") {
            config.serializer_workers = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_SERIALIZER_WORKERS must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_WRITER_WORKERS") {
            config.writer_workers = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_WRITER_WORKERS must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_FILE_FALLBACK_PATH") {
            config.file_fallback_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("NOMINAL_TRACK_METRICS") {
            config.track_metrics = v == "1" || v.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }
}

/// Configuration shared by the multipart uploader and downloader.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Chunk/part size in bytes. Default 64 MiB.
    pub chunk_size: u64,
    /// Parallel worker count. Default = CPU count.
    pub max_workers: usize,
    /// Per-part retry budget. Default 3.
    pub max_part_retries: u32,
    /// Per-request timeout. Default 30s.
    pub timeout: Duration,
    /// Presigned-URL time-to-live.
    pub ttl: Duration,
    /// Buffer subtracted from `ttl` to keep returned URLs usable.
    pub skew: Duration,
}

/// Minimum chunk size accepted for S3-compatible multipart uploads.
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
/// Default chunk/part size for uploads and downloads.
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: num_cpus(),
            max_part_retries: 3,
            timeout: Duration::from_secs(30),
            ttl: Duration::from_secs(900),
            skew: Duration::from_secs(60),
        }
    }
}

impl TransferConfig {
    /// Load overrides from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var("NOMINAL_CHUNK_SIZE") {
            config.chunk_size = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_CHUNK_SIZE must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_MAX_WORKERS") {
            config.max_workers = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_MAX_WORKERS must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_MAX_PART_RETRIES") {
            config.max_part_retries = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_MAX_PART_RETRIES must be an integer"))?;
        }
        if let Ok(v) = env::var("NOMINAL_TIMEOUT_SECS") {
            let secs: u64 = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_TIMEOUT_SECS must be an integer"))?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that must hold before any I/O starts.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::config(format!(
                "chunk_size must be >= {MIN_CHUNK_SIZE} bytes for S3 compatibility"
            )));
        }
        if self.max_workers == 0 {
            return Err(Error::config("max_workers must be > 0"));
        }
        Ok(())
    }
}

/// Top-level client configuration: connection details plus the two
/// sub-configs above.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ingestion service, e.g. `https://api.nominal.io`.
    pub base_url: String,
    /// Opaque bearer credential. Authentication itself is out of scope.
    pub bearer_token: String,
    /// HTTP transport configuration.
    pub http: HttpClientConfig,
    /// Streaming pipeline configuration.
    pub stream: StreamConfig,
    /// Multipart uploader/downloader configuration.
    pub transfer: TransferConfig,
}

impl Config {
    /// Build configuration from explicit values, applying environment
    /// overrides for anything not supplied.
    pub fn from_env(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        Ok(Self {
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
            http: HttpClientConfig::from_env()?,
            stream: StreamConfig::from_env()?,
            transfer: TransferConfig::from_env()?,
        })
    }
}

/// Probe the number of logical CPUs, defaulting to 1 if unavailable.
///
/// This and tracing-subscriber initialization are the only process-wide
/// state the core touches; there are no other singletons.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_config_defaults_match_spec() {
        let config = StreamConfig::default();
        assert_eq!(config.max_batch_size, 50_000);
        assert_eq!(config.max_wait, Duration::from_secs(1));
        assert_eq!(config.max_queue_size, 0);
        assert_eq!(config.overflow_mode, OverflowMode::Block);
        assert!(!config.track_metrics);
    }

    #[test]
    fn transfer_config_defaults_match_spec() {
        let config = TransferConfig::default();
        assert_eq!(config.chunk_size, 64 * 1024 * 1024);
        assert_eq!(config.max_part_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn transfer_config_rejects_small_chunk_size() {
        let mut config = TransferConfig::default();
        config.chunk_size = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overflow_mode_parses_from_str() {
        assert_eq!("block".parse::<OverflowMode>().unwrap(), OverflowMode::Block);
        assert_eq!(
            "drop_newest".parse::<OverflowMode>().unwrap(),
            OverflowMode::DropNewest
        );
        assert_eq!(
            "drop_oldest".parse::<OverflowMode>().unwrap(),
            OverflowMode::DropOldest
        );
        assert!("garbage".parse::<OverflowMode>().is_err());
    }

    #[test]
    fn num_cpus_is_at_least_one() {
        assert!(num_cpus() >= 1);
    }
}
