use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::backoff::RetryPolicy;
use crate::error::StoreError;
use crate::protocol::{Envelope, Request};
use crate::transport::{RawResponse, ReqwestTransport, Transport, TransportSettings};

/// Which web app a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Listing, batch fetch and partner directory.
    Reader,
    /// Row upserts.
    Writer,
}

/// Thin JSON-over-POST client for the remote store.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct StoreClient {
    transport: Arc<dyn Transport>,
    reader_url: String,
    writer_url: String,
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("reader_url", &self.reader_url)
            .field("writer_url", &self.writer_url)
            .finish_non_exhaustive()
    }
}

impl StoreClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        reader_url: impl Into<String>,
        writer_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            reader_url: reader_url.into(),
            writer_url: writer_url.into(),
        }
    }

    /// Client over [`ReqwestTransport`] configured from the `[store]` section.
    pub fn from_config(store: &feedtally_core::config::StoreConfig) -> Result<Self, StoreError> {
        let transport = ReqwestTransport::new(&TransportSettings {
            user_agent: store.user_agent.clone(),
            request_timeout: store.request_timeout(),
            connect_timeout: store.connect_timeout(),
        })?;
        Ok(Self::new(
            Arc::new(transport),
            store.endpoint.trim(),
            store.writer_url(),
        ))
    }

    fn url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Reader => &self.reader_url,
            Endpoint::Writer => &self.writer_url,
        }
    }

    /// Send `request` and parse the response body as `R`.
    ///
    /// Transient failures (see [`StoreError::is_transient`]) are retried per
    /// `retry`; a body that does not parse is never retried.
    pub async fn call<R: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: &Request<'_>,
        retry: RetryPolicy,
    ) -> Result<R, StoreError> {
        let operation = request.operation();
        let body = serde_json::to_vec(request).map_err(|e| StoreError::Malformed {
            operation,
            message: format!("could not encode request: {e}"),
        })?;
        let attempts = retry.attempts.max(1);

        let mut attempt = 0;
        let raw = loop {
            let result = self.send_once(endpoint, body.clone()).await;
            match result {
                Ok(raw) => break raw,
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        attempts,
                        error = %e,
                        "transient store failure; retrying"
                    );
                    retry.backoff.pause(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        serde_json::from_slice(&raw.body).map_err(|e| StoreError::Malformed {
            operation,
            message: e.to_string(),
        })
    }

    /// Like [`call`](Self::call), then turn an `ok: false` envelope into
    /// [`StoreError::Rejected`].
    pub async fn call_ok<R: DeserializeOwned + Envelope>(
        &self,
        endpoint: Endpoint,
        request: &Request<'_>,
        retry: RetryPolicy,
    ) -> Result<R, StoreError> {
        let resp: R = self.call(endpoint, request, retry).await?;
        if !resp.ok() {
            return Err(StoreError::Rejected {
                operation: request.operation(),
                message: resp.error().unwrap_or("no error message").to_string(),
            });
        }
        Ok(resp)
    }

    async fn send_once(&self, endpoint: Endpoint, body: Vec<u8>) -> Result<RawResponse, StoreError> {
        let raw = self.transport.post_json(self.url(endpoint), body).await?;
        if !raw.is_success() {
            let text: String = String::from_utf8_lossy(&raw.body).chars().take(300).collect();
            return Err(StoreError::Status {
                status: raw.status,
                body: text,
            });
        }
        Ok(raw)
    }
}
