// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Higher-level request helpers built on [`HttpClient`] and the retry loop.
//!
//! These are the primitives every other component (control-plane calls from
//! the uploader, the channel-writer POST, presigned PUT/GET) is built from,
//! so the retry policy and auth header only need to be right in one place.

use std::pin::Pin;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::HttpClient;
use super::middleware::{gzip_compress, CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF};
use super::retry::execute_with_retry;
use crate::error::{Error, Result};

impl HttpClient {
    /// POST a JSON body to a control-plane endpoint, gzip-compressed,
    /// retried on transient failure, and deserialize the JSON response.
    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| Error::serialization(format!("request body: {e}")))?;
        let response = self.post_gzip(url, payload, CONTENT_TYPE_JSON).await?;
        response
            .json::<R>()
            .await
            .map_err(|source| Error::Transport { source })
    }

    /// POST a pre-serialized protobuf body, gzip-compressed and retried,
    /// discarding the response body (the channel-writer endpoint returns
    /// nothing interesting on success).
    pub async fn post_protobuf(&self, url: &str, body: Vec<u8>) -> Result<()> {
        self.post_gzip(url, body, CONTENT_TYPE_PROTOBUF).await?;
        Ok(())
    }

    async fn post_gzip(&self, url: &str, body: Vec<u8>, content_type: &str) -> Result<Response> {
        let compressed = gzip_compress(&body)?;
        let auth = self.auth_header();

        execute_with_retry(self.config(), move || {
            let client = self.inner().clone();
            let url = url.to_string();
            let compressed = compressed.clone();
            let auth = auth.clone();
            let content_type = content_type.to_string();

            Box::pin(async move {
                let response = client
                    .post(&url)
                    .header("Authorization", &auth)
                    .header("Accept", CONTENT_TYPE_JSON)
                    .header("Content-Type", &content_type)
                    .header("Content-Encoding", "gzip")
                    .header("Content-Length", compressed.len().to_string())
                    .body(compressed)
                    .send()
                    .await
                    .map_err(|source| Error::Transport { source })?;

                ensure_success(response).await
            }) as Pin<Box<dyn std::future::Future<Output = Result<Response>> + Send>>
        })
        .await
    }

    /// PUT raw bytes to a presigned object-store URL. Never gzipped — the
    /// object store stores the bytes verbatim. Retried by the caller's own
    /// re-signing loop, not by this helper, since a failed PUT may need a
    /// fresh signature before the next attempt.
    pub async fn put_bytes(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<Response> {
        let mut request = self.inner().put(url).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|source| Error::Transport { source })?;
        ensure_success(response).await
    }

    /// GET a byte range from a presigned object-store URL.
    pub async fn get_range(&self, url: &str, start: u64, end: u64) -> Result<Response> {
        let response = self
            .inner()
            .get(url)
            .header("Range", format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|source| Error::Transport { source })?;
        ensure_success(response).await
    }

    /// HEAD a presigned object-store URL.
    pub async fn head(&self, url: &str) -> Result<Response> {
        self.inner()
            .head(url)
            .send()
            .await
            .map_err(|source| Error::Transport { source })
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::api(status, body))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::client::HttpClientConfig;

    #[derive(Serialize)]
    struct Ping {
        msg: String,
    }

    #[derive(Deserialize, PartialEq, Debug)]
    struct Pong {
        ok: bool,
    }

    fn client() -> HttpClient {
        HttpClient::new(HttpClientConfig::default(), "tok123").unwrap()
    }

    #[tokio::test]
    async fn post_json_sends_gzip_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(header("Content-Encoding", "gzip"))
            .and(header("Authorization", "Bearer tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let http = client();
        let response: Pong = http
            .post_json(&format!("{}/write", server.uri()), &Ping { msg: "hi".to_string() })
            .await
            .unwrap();
        assert_eq!(response, Pong { ok: true });
    }

    #[tokio::test]
    async fn post_protobuf_posts_raw_bytes_and_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/writer/v1/nominal/rid1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let http = client();
        http.post_protobuf(&format!("{}/storage/writer/v1/nominal/rid1", server.uri()), vec![1, 2, 3])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_retryable_status_becomes_api_error_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let http = client();
        let err = http
            .post_json::<_, Pong>(&format!("{}/write", server.uri()), &Ping { msg: "hi".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn put_bytes_attaches_caller_supplied_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/object/key1"))
            .and(header("x-amz-meta-foo", "bar"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let http = client();
        http.put_bytes(
            &format!("{}/object/key1", server.uri()),
            &[("x-amz-meta-foo".to_string(), "bar".to_string())],
            b"payload".to_vec(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn get_range_sets_byte_range_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/object/key1"))
            .and(header("Range", "bytes=10-19"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0u8; 10]))
            .mount(&server)
            .await;

        let http = client();
        let response = http.get_range(&format!("{}/object/key1", server.uri()), 10, 19).await.unwrap();
        assert_eq!(response.bytes().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn head_request_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/object/key1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let http = client();
        http.head(&format!("{}/object/key1", server.uri())).await.unwrap();
    }
}
