// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Wire DTOs for the server-mediated multipart upload protocol.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request body for `POST {base}/upload/v1/initiate-multipart-upload`.
#[derive(Debug, Serialize)]
pub struct InitiateRequest {
    /// Name of the file being uploaded.
    pub filename: String,
    /// MIME type of the file.
    pub filetype: String,
    /// Optional workspace/project scoping for the upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

/// Response body for `initiate-multipart-upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateResponse {
    /// Object-store key the upload will land at.
    pub key: String,
    /// Server-assigned multipart upload id.
    pub upload_id: String,
}

/// Request body for `POST {base}/upload/v1/sign-part`.
#[derive(Debug, Serialize)]
pub struct SignPartRequest {
    /// Object-store key from [`InitiateResponse`].
    pub key: String,
    /// 1-based part number.
    pub part_number: u32,
    /// Upload id from [`InitiateResponse`].
    pub upload_id: String,
}

/// Response body for `sign-part`: a presigned PUT URL and headers to send
/// along with the chunk bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct SignPartResponse {
    /// Presigned PUT URL for this part.
    pub url: String,
    /// Headers the object store requires on the PUT.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Request body for `POST {base}/upload/v1/list-parts`.
#[derive(Debug, Serialize)]
pub struct ListPartsRequest {
    /// Object-store key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
}

/// One uploaded part, identified by its number and the ETag the object
/// store returned for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartEtag {
    /// 1-based part number.
    pub part_number: u32,
    /// ETag the object store returned for this part's PUT.
    pub etag: String,
}

/// Response body for `list-parts`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPartsResponse {
    /// All parts the server has recorded for this upload.
    pub parts: Vec<PartEtag>,
}

/// Request body for `POST {base}/upload/v1/complete-multipart-upload`.
#[derive(Debug, Serialize)]
pub struct CompleteRequest {
    /// Object-store key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Parts in ascending part-number order.
    pub parts: Vec<PartEtag>,
}

/// Response body for `complete-multipart-upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResponse {
    /// Final object location, e.g. `s3://bucket/key`.
    pub location: String,
}

/// Request body for `POST {base}/upload/v1/abort-multipart-upload`.
#[derive(Debug, Serialize)]
pub struct AbortRequest {
    /// Object-store key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
}
