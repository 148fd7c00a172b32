// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Nominal Contributors

//! Pooled HTTPS client configuration and construction.

use std::time::Duration;

use super::middleware::bearer_header;
use crate::error::{Error, Result};

/// Configuration for the pooled HTTPS client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Overall per-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub retry_base_delay: Duration,
    /// Ceiling on the computed backoff delay, before jitter.
    pub retry_max_delay: Duration,
    /// Whether to add jitter to retry delays.
    pub retry_jitter: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            retry_jitter: true,
        }
    }
}

impl HttpClientConfig {
    /// Load overrides from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("NOMINAL_HTTP_TIMEOUT_SECS") {
            let secs: u64 = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_HTTP_TIMEOUT_SECS must be an integer"))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("NOMINAL_HTTP_MAX_RETRIES") {
            config.max_retries = v
                .parse()
                .map_err(|_| Error::config("NOMINAL_HTTP_MAX_RETRIES must be an integer"))?;
        }

        Ok(config)
    }

    /// Build the underlying `reqwest::Client` for this configuration.
    pub fn create_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|source| Error::Transport { source })
    }
}

/// A pooled HTTPS client: one per process is enough, shared across
/// components A-I via `Arc`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpClientConfig,
    bearer_token: String,
}

impl HttpClient {
    /// Construct a client carrying the given bearer credential.
    pub fn new(config: HttpClientConfig, bearer_token: impl Into<String>) -> Result<Self> {
        let client = config.create_client()?;
        Ok(Self {
            client,
            config,
            bearer_token: bearer_token.into(),
        })
    }

    /// The underlying `reqwest::Client`, for components that need to build
    /// their own requests (e.g. streaming PUTs with caller-supplied headers).
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// The `Authorization: Bearer <token>` header value.
    pub fn auth_header(&self) -> String {
        bearer_header(&self.bearer_token)
    }
}
