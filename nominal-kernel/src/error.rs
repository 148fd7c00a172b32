// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Error taxonomy shared by every component of the core.
//!
//! Each variant below corresponds to one of the categories enumerated in the
//! error handling design: bad input is surfaced before any I/O starts
//! (`Config`), transient failures are retried transparently by the transport
//! and never reach a caller as this type (`Transport` only appears once the
//! retry budget is exhausted), presign expiry and permanent 4xx responses are
//! distinguished because the former drives a cache invalidation + retry loop
//! while the latter does not, and `Serialization`/`Shutdown` guard the two
//! places outside HTTP where the core refuses to proceed.

use std::path::PathBuf;

/// Result alias used throughout the core crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Statuses that indicate a presigned URL needs to be refreshed.
pub const EXPIRED_PRESIGN_STATUSES: [u16; 3] = [400, 401, 403];

/// Statuses the HTTP transport retries transparently.
pub const RETRYABLE_STATUSES: [u16; 6] = [308, 429, 500, 502, 503, 504];

/// Top-level error type for the ingestion/streaming core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad configuration or caller input, detected before any I/O begins.
    #[error("{message}")]
    Config {
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// The HTTP transport exhausted its retry budget against a transient failure.
    #[error("transport error: {source}")]
    Transport {
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// Every retry attempt against a presigned URL reported an expired status.
    #[error("presigned URL expired (status {status}) and retry budget was exhausted")]
    PresignExpired {
        /// Last HTTP status observed.
        status: u16,
    },

    /// Content integrity check failed (e.g. ETag mismatch across parts).
    #[error("integrity check failed: {message}")]
    Integrity {
        /// Description of the mismatch.
        message: String,
        /// Destination path affected, if applicable.
        path: Option<PathBuf>,
    },

    /// A permanent 4xx response from a control-plane endpoint.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code returned.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// A batch could not be serialized (e.g. mixed value types within a group).
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// An item was enqueued after the pipeline began shutting down.
    #[error("enqueue rejected: pipeline is shutting down")]
    Shutdown,

    /// Local filesystem I/O failure (preallocation, part write, cleanup).
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Aborting a multipart upload itself failed; `original` is preserved as
    /// the cause the abort was attempted for.
    #[error("abort_multipart_upload failed ({abort_source}); original failure: {original}")]
    AbortFailed {
        /// The error that triggered the abort attempt.
        original: Box<Error>,
        /// The error raised by the abort attempt itself.
        abort_source: Box<Error>,
    },
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl Error {
    /// True if this status code should be treated as an expired presigned URL.
    pub fn is_expired_presign_status(status: u16) -> bool {
        EXPIRED_PRESIGN_STATUSES.contains(&status)
    }

    /// True if this status code is retried transparently by the transport.
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Build a `Config` error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Build an `Api` error from a status and body/message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// Build a `Serialization` error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
        }
    }

    /// Chain an abort failure onto the original error per the uploader's
    /// abort-on-failure contract.
    pub fn chain_abort_failure(original: Error, abort_source: Error) -> Self {
        Error::AbortFailed {
            original: Box::new(original),
            abort_source: Box::new(abort_source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_presign_statuses_match_spec() {
        assert!(Error::is_expired_presign_status(400));
        assert!(Error::is_expired_presign_status(401));
        assert!(Error::is_expired_presign_status(403));
        assert!(!Error::is_expired_presign_status(404));
        assert!(!Error::is_expired_presign_status(200));
    }

    #[test]
    fn retryable_statuses_match_spec() {
        for status in [308, 429, 500, 502, 503, 504] {
            assert!(Error::is_retryable_status(status));
        }
        assert!(!Error::is_retryable_status(400));
        assert!(!Error::is_retryable_status(404));
        assert!(!Error::is_retryable_status(200));
    }

    #[test]
    fn config_helper_builds_config_variant() {
        let err = Error::config("chunk_size must be > 0");
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(err.to_string(), "chunk_size must be > 0");
    }

    #[test]
    fn abort_failure_chains_original() {
        let original = Error::api(403, "forbidden");
        let abort_err = Error::Io {
            source: std::io::Error::new(std::io::ErrorKind::Other, "network down"),
        };
        let chained = Error::chain_abort_failure(original, abort_err);
        match chained {
            Error::AbortFailed { original, .. } => {
                assert!(matches!(*original, Error::Api { status: 403, .. }));
            }
            _ => panic!("expected AbortFailed"),
        }
    }
}
