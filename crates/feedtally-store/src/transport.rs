//! HTTP transport seam.
//!
//! [`StoreClient`](crate::StoreClient) talks to the store through the
//! [`Transport`] trait so the retry and protocol layers can be driven by an
//! in-process fake. [`ReqwestTransport`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as `application/json` to `url`.
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<RawResponse, StoreError>;
}

/// Settings for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .pool_idle_timeout(Duration::from_secs(120))
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    fn classify_error(e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(e.to_string())
        } else if e.is_connect() {
            StoreError::Connect(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<RawResponse, StoreError> {
        let start = tokio::time::Instant::now();
        let resp = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Self::classify_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(Self::classify_error)?.to_vec();
        tracing::debug!(
            status,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "store POST complete"
        );
        Ok(RawResponse { status, body })
    }
}
