//! HTTP transport to the external accounting server
//!
//! One job: POST an XML payload to the configured endpoint and hand back the
//! raw response text within a hard timeout. Retry policy does not live here;
//! the orchestrator and push pipeline decide what is worth re-sending.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderValue, CONTENT_TYPE};

use crate::types::{SyncError, SyncResult};

/// Hard timeout for any call to the external server.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Seam between the sync engine and the network.
///
/// The orchestrator and push pipeline only ever talk to this trait, so tests
/// can script responses without a server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `xml_body` to `server_url` and return the raw response text
    async fn send(&self, server_url: &str, xml_body: String) -> SyncResult<String>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, server_url: &str, xml_body: String) -> SyncResult<String> {
        (**self).send(server_url, xml_body).await
    }
}

/// reqwest-backed client for the external accounting server
#[derive(Debug, Clone)]
pub struct TallyClient {
    client: reqwest::Client,
}

impl Default for TallyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TallyClient {
    /// Create a client with the default 30 second timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("server response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("server response error ({}): {}", status, preview);
    }
}

#[async_trait]
impl Transport for TallyClient {
    async fn send(&self, server_url: &str, xml_body: String) -> SyncResult<String> {
        debug!("POST {} ({} bytes)", server_url, xml_body.len());

        let response = self
            .client
            .post(server_url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
            .body(xml_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SyncError::Timeout(server_url.to_string())
                } else {
                    SyncError::Connection(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                SyncError::Timeout(server_url.to_string())
            } else {
                SyncError::Connection(err.to_string())
            }
        })?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(SyncError::http(status.as_u16(), body));
        }

        Ok(body)
    }
}
