//! Publisher: chunked, keyed upserts of daily rows.
//!
//! Rows are sent in chunks of `chunk_size`. When `clear_first` is set only
//! the first chunk carries the flag, so the store wipes the day's rows once
//! and later chunks append. If that first chunk fails the day would be left
//! half cleared, so the failure aborts the publish; any other chunk failure
//! is logged and reported in [`PublishReport::failed_chunks`].

use chrono::NaiveDate;
use feedtally_core::config::{PublishConfig, StoreConfig};
use serde::Serialize;
use thiserror::Error;

use crate::backoff::{Backoff, RetryPolicy};
use crate::client::{Endpoint, StoreClient};
use crate::error::StoreError;
use crate::protocol::{Request, Table, UpsertResponse};

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub root_folder: String,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// Pause between chunks.
    pub pacing: Backoff,
}

impl PublishSettings {
    pub fn from_config(store: &StoreConfig, publish: &PublishConfig) -> Self {
        Self {
            root_folder: store.sheets_root.clone(),
            chunk_size: publish.chunk_size.max(1),
            retry: RetryPolicy::new(
                publish.max_attempts,
                Backoff::from_millis(publish.base_delay_ms, publish.base_delay_ms / 2),
            ),
            pacing: Backoff::from_millis(publish.base_delay_ms / 6, publish.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub table: Table,
    pub date: NaiveDate,
    pub attempted: usize,
    pub written: usize,
    /// Zero-based indexes of chunks that were not written.
    pub failed_chunks: Vec<usize>,
    pub target_location: Option<String>,
    pub sheet_name: Option<String>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not encode rows: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("clearing chunk for {table} on {date} failed; rerun with clear-first: {source}")]
    ClearingChunk {
        table: Table,
        date: NaiveDate,
        #[source]
        source: StoreError,
    },
}

pub struct Publisher<'a> {
    client: &'a StoreClient,
    settings: &'a PublishSettings,
}

impl<'a> Publisher<'a> {
    pub fn new(client: &'a StoreClient, settings: &'a PublishSettings) -> Self {
        Self { client, settings }
    }

    /// Upsert `rows` into `table` for `date`.
    ///
    /// An empty `rows` sends nothing, even with `clear_first`.
    pub async fn publish<R: Serialize>(
        &self,
        table: Table,
        date: NaiveDate,
        rows: &[R],
        clear_first: bool,
    ) -> Result<PublishReport, PublishError> {
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = PublishReport {
            table,
            date,
            attempted: values.len(),
            written: 0,
            failed_chunks: Vec::new(),
            target_location: None,
            sheet_name: None,
        };
        if values.is_empty() {
            tracing::info!(%table, %date, "nothing to publish");
            return Ok(report);
        }

        let chunks: Vec<&[serde_json::Value]> = values.chunks(self.settings.chunk_size.max(1)).collect();
        let total = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            if index > 0 {
                self.settings.pacing.pause(0).await;
            }
            let clearing = clear_first && index == 0;
            let req = Request::UpsertDailyRows {
                table,
                date,
                rows: chunk,
                clear_first: clearing,
                root_folder: &self.settings.root_folder,
            };
            let result: Result<UpsertResponse, StoreError> = self
                .client
                .call_ok(Endpoint::Writer, &req, self.settings.retry)
                .await;

            match result {
                Ok(resp) => {
                    report.written += chunk.len();
                    report.target_location = report.target_location.or(resp.target_location);
                    report.sheet_name = report.sheet_name.or(resp.sheet_name);
                    tracing::info!(%table, %date, chunk = index + 1, chunks = total, rows = chunk.len(), clearing, "upserted chunk");
                }
                Err(source) if clearing => {
                    return Err(PublishError::ClearingChunk { table, date, source });
                }
                Err(e) => {
                    tracing::warn!(%table, %date, chunk = index + 1, chunks = total, error = %e, "upsert chunk failed");
                    report.failed_chunks.push(index);
                }
            }
        }
        Ok(report)
    }
}
