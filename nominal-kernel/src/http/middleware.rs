// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Header conventions and gzip request-body compression.
//!
//! Compression applies only to non-streaming POST bodies (control-plane
//! calls, channel-writer POSTs): the object store on the other end of a
//! streaming PUT does not decode gzip, so multipart upload bodies are never
//! compressed here.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Compression level used for gzip-encoded request bodies.
pub const GZIP_COMPRESSION_LEVEL: u32 = 1;

/// `Content-Type` for JSON request/response bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `Content-Type` for the columnar protobuf write request.
pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Gzip-compress a request body at the fixed level used across the core.
/// Returns the compressed bytes; the caller is responsible for setting
/// `Content-Encoding: gzip` and an accurate `Content-Length`.
pub fn gzip_compress(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_COMPRESSION_LEVEL));
    encoder.write_all(body).map_err(Error::from)?;
    encoder.finish().map_err(Error::from)
}

/// The bearer `Authorization` header value for a given token.
pub fn bearer_header(token: &str) -> String {
    format!("Bearer {token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn gzip_round_trips() {
        let body = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = gzip_compress(&body).unwrap();
        assert!(compressed.len() < body.len());

        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn bearer_header_format() {
        assert_eq!(bearer_header("abc"), "Bearer abc");
    }
}
