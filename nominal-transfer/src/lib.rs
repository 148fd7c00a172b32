// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! Multipart Uploader (component C) and Multipart Downloader (component D):
//! parallel chunked transfer of large binary objects via server-mediated
//! presigned URLs.

pub mod download;
pub mod protocol;
pub mod upload;

pub use download::{DownloadClient, DownloadItem, DownloadResults};
pub use upload::UploadClient;
