//! Batch fetcher.
//!
//! Artifacts are requested in chunks of at most
//! [`MAX_FETCH_CHUNK`](feedtally_core::config::MAX_FETCH_CHUNK) names. Two
//! passes run in sequence over a [`StrategyChain`]:
//!
//! 1. the first pass walks every name with the configured chunk size;
//! 2. the retry pass re-requests only what the first pass left missing, in
//!    smaller chunks with a longer, randomised pause.
//!
//! Within a chunk the batch call is tried first; when its response cannot be
//! parsed the chunk falls back to one request per name. Names that are still
//! missing after both passes are reported in [`FetchOutcome::missing`],
//! never dropped silently.
//!
//! Only a transport failure on the very first request is fatal: it means the
//! store is unreachable and nothing else will work either.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use feedtally_core::config::{FetchConfig, StoreConfig};
use feedtally_core::strategy::{Partial, StrategyChain};
use feedtally_core::FetchedContent;
use thiserror::Error;

use crate::backoff::{Backoff, RetryPolicy};
use crate::client::{Endpoint, StoreClient};
use crate::decode::{decode_base64, decode_text};
use crate::error::StoreError;
use crate::protocol::{BatchItem, BatchResponse, Request};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub folder: String,
    pub chunk_size: usize,
    pub retry_chunk_size: usize,
    /// Pause between requests; the retry pass uses the next backoff step.
    pub pacing: Backoff,
    /// Transport-level retries of a single batch request.
    pub transport_retry: RetryPolicy,
}

impl FetchSettings {
    pub fn from_config(store: &StoreConfig, fetch: &FetchConfig) -> Self {
        Self {
            folder: store.folder.clone(),
            chunk_size: fetch.first_pass_chunk(),
            retry_chunk_size: fetch.retry_pass_chunk(),
            pacing: Backoff::from_millis(fetch.base_delay_ms, fetch.jitter_ms),
            transport_retry: RetryPolicy::new(
                fetch.transport_attempts,
                Backoff::from_millis(fetch.base_delay_ms.max(500), fetch.jitter_ms),
            ),
        }
    }
}

/// Texts of every artifact that could be fetched, plus the names that could not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub texts: BTreeMap<String, String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("artifact store unreachable: {0}")]
    Unreachable(#[source] StoreError),
}

#[derive(Debug, Clone, Copy)]
struct Pass {
    chunk_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkMode {
    Batch,
    PerItem,
}

pub struct BatchFetcher<'a> {
    client: &'a StoreClient,
    settings: &'a FetchSettings,
    passes: StrategyChain<Pass>,
    modes: StrategyChain<ChunkMode>,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(client: &'a StoreClient, settings: &'a FetchSettings) -> Self {
        let cap = feedtally_core::config::MAX_FETCH_CHUNK;
        Self {
            client,
            settings,
            passes: StrategyChain::new(vec![
                Pass {
                    chunk_size: settings.chunk_size.clamp(1, cap),
                },
                Pass {
                    chunk_size: settings.retry_chunk_size.clamp(1, cap),
                },
            ]),
            modes: StrategyChain::new(vec![ChunkMode::Batch, ChunkMode::PerItem]),
        }
    }

    /// Fetch and decode every name in `names` for `date`.
    pub async fn fetch(&self, date: NaiveDate, names: &[String]) -> Result<FetchOutcome, FetchError> {
        let this = self;
        let drained = self
            .passes
            .drain_async(names.to_vec(), move |index, pass, pending| {
                this.run_pass(date, index, *pass, pending)
            })
            .await?;

        let outcome = FetchOutcome {
            texts: drained.done.into_iter().collect(),
            missing: drained.pending,
        };
        if outcome.missing.is_empty() {
            tracing::info!(%date, fetched = outcome.texts.len(), "fetch complete");
        } else {
            tracing::warn!(
                %date,
                fetched = outcome.texts.len(),
                missing = outcome.missing.len(),
                "fetch complete with missing artifacts"
            );
        }
        Ok(outcome)
    }

    async fn run_pass(
        &self,
        date: NaiveDate,
        index: usize,
        pass: Pass,
        pending: Vec<String>,
    ) -> Result<Partial<(String, String), String>, FetchError> {
        let chunks: Vec<&[String]> = pending.chunks(pass.chunk_size).collect();
        tracing::info!(
            %date,
            pass = index,
            names = pending.len(),
            chunks = chunks.len(),
            chunk_size = pass.chunk_size,
            "fetch pass"
        );

        let mut out = Partial::new();
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let first_request = index == 0 && chunk_index == 0;
            if !first_request {
                self.settings.pacing.pause(index as u32).await;
            }
            let step = self.fetch_chunk(date, index, chunk, first_request).await?;
            out.done.extend(step.done);
            out.pending.extend(step.pending);
        }
        Ok(out)
    }

    async fn fetch_chunk(
        &self,
        date: NaiveDate,
        pass: usize,
        chunk: &[String],
        first_request: bool,
    ) -> Result<Partial<(String, String), String>, FetchError> {
        let attempted = self
            .modes
            .first_match_async(move |_, mode| self.try_mode(date, pass, *mode, chunk))
            .await;

        match attempted {
            Ok(Some((_, partial))) => Ok(partial),
            Ok(None) => Ok(all_pending(chunk)),
            Err(e) if first_request => Err(FetchError::Unreachable(e)),
            Err(e) => {
                tracing::warn!(%date, pass, names = chunk.len(), error = %e, "chunk failed; names marked missing");
                Ok(all_pending(chunk))
            }
        }
    }

    /// `Ok(None)` hands the chunk to the next mode.
    async fn try_mode(
        &self,
        date: NaiveDate,
        pass: usize,
        mode: ChunkMode,
        chunk: &[String],
    ) -> Result<Option<Partial<(String, String), String>>, StoreError> {
        match mode {
            ChunkMode::Batch => match self.request(date, chunk).await {
                Ok(resp) => Ok(Some(collect(chunk, resp))),
                Err(e @ StoreError::Malformed { .. }) => {
                    tracing::warn!(%date, pass, names = chunk.len(), error = %e, "unparseable batch; falling back to per-item requests");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            ChunkMode::PerItem => {
                let mut out = Partial::new();
                for (i, name) in chunk.iter().enumerate() {
                    if i > 0 {
                        self.settings.pacing.pause(pass as u32).await;
                    }
                    let single = std::slice::from_ref(name);
                    match self.request(date, single).await {
                        Ok(resp) => {
                            let step = collect(single, resp);
                            out.done.extend(step.done);
                            out.pending.extend(step.pending);
                        }
                        Err(e) => {
                            tracing::warn!(%date, file = %name, error = %e, "per-item fetch failed");
                            out.pending.push(name.clone());
                        }
                    }
                }
                Ok(Some(out))
            }
        }
    }

    async fn request(&self, date: NaiveDate, filenames: &[String]) -> Result<BatchResponse, StoreError> {
        let req = Request::GetFilesBatch {
            folder: &self.settings.folder,
            date,
            filenames,
        };
        let resp: BatchResponse = self
            .client
            .call(Endpoint::Reader, &req, self.settings.transport_retry)
            .await?;
        if !resp.ok {
            tracing::warn!(%date, error = ?resp.error, "batch response not ok");
        }
        Ok(resp)
    }
}

fn all_pending(chunk: &[String]) -> Partial<(String, String), String> {
    Partial {
        done: Vec::new(),
        pending: chunk.to_vec(),
    }
}

/// Split a batch response into decoded texts and still-missing names.
///
/// Items for names that were not requested are ignored; requested names
/// absent from the response count as missing.
fn collect(requested: &[String], resp: BatchResponse) -> Partial<(String, String), String> {
    let wanted: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
    let mut texts: BTreeMap<String, String> = BTreeMap::new();

    for item in resp.files {
        if !wanted.contains(item.name.as_str()) {
            tracing::debug!(file = %item.name, "ignoring unrequested item in batch response");
            continue;
        }
        if texts.contains_key(&item.name) {
            continue;
        }
        let Some(content) = decode_item(item) else {
            continue;
        };
        match decode_text(&content.name, &content.raw_bytes) {
            Ok(text) => {
                texts.insert(content.name, text);
            }
            Err(e) => {
                tracing::warn!(file = %content.name, error = %e, "payload could not be decoded");
            }
        }
    }

    let mut out = Partial::new();
    for name in requested {
        match texts.remove(name) {
            Some(text) => out.done.push((name.clone(), text)),
            None => out.pending.push(name.clone()),
        }
    }
    out
}

fn decode_item(item: BatchItem) -> Option<FetchedContent> {
    if !item.ok {
        tracing::warn!(file = %item.name, error = ?item.error, "store could not read artifact");
        return None;
    }
    let payload = item.content_base64.as_deref().unwrap_or("");
    match decode_base64(payload) {
        Ok(raw_bytes) => Some(FetchedContent {
            name: item.name,
            raw_bytes,
            ok: true,
        }),
        Err(e) => {
            tracing::warn!(file = %item.name, error = %e, "undecodable payload");
            None
        }
    }
}
