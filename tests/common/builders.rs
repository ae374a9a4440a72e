//! Test builders: clients, settings and pipelines wired to a [`FakeStore`].
//!
//! Every pause and backoff is zero so harnesses run at full speed. These
//! helpers panic on invalid input rather than returning `Result`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use feedtally::{Pipeline, PipelineSettings, RunOptions};
use feedtally_core::extract::RuleTable;
use feedtally_store::{
    Backoff, FetchSettings, PublishSettings, RetryPolicy, ReqwestTransport, StoreClient,
    TransportSettings,
};

use super::fake_store::FakeStore;
use super::fixtures::{DATE, DAY};

pub fn day() -> NaiveDate {
    DATE.parse().unwrap()
}

pub fn stamp() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-09-04T06:00:00+02:00").unwrap()
}

pub fn client_for(store: &FakeStore) -> StoreClient {
    client_at(&store.reader_url(), &store.writer_url())
}

pub fn client_at(reader: &str, writer: &str) -> StoreClient {
    let transport = ReqwestTransport::new(&TransportSettings {
        user_agent: "feedtally-tests".into(),
        request_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(2),
    })
    .unwrap();
    StoreClient::new(Arc::new(transport), reader, writer)
}

pub fn fast_fetch_settings() -> FetchSettings {
    FetchSettings {
        folder: "LogsArchive".into(),
        chunk_size: 20,
        retry_chunk_size: 6,
        pacing: Backoff::none(),
        transport_retry: RetryPolicy::new(3, Backoff::none()),
    }
}

pub fn fast_publish_settings() -> PublishSettings {
    PublishSettings {
        root_folder: "Logs-Sheets".into(),
        chunk_size: 80,
        retry: RetryPolicy::new(3, Backoff::none()),
        pacing: Backoff::none(),
    }
}

pub fn pipeline_settings() -> PipelineSettings {
    PipelineSettings {
        folder: "LogsArchive".into(),
        fetch: fast_fetch_settings(),
        publish: fast_publish_settings(),
        only_active_partners: true,
        publish_totals: true,
        publish_partners: true,
        timezone: chrono_tz::Europe::Rome,
        pause_between_days: Duration::ZERO,
    }
}

pub fn pipeline_for(store: &FakeStore) -> Pipeline {
    pipeline_with(store, pipeline_settings())
}

pub fn pipeline_with(store: &FakeStore, settings: PipelineSettings) -> Pipeline {
    let client = client_for(store);
    Pipeline::new(
        client.clone(),
        Arc::new(client),
        RuleTable::builtin().unwrap(),
        settings,
    )
}

pub fn run_opts(clear_first: bool) -> RunOptions {
    RunOptions {
        clear_first,
        preview: false,
        updated_at: Some(stamp()),
    }
}

/// Load the [`DAY`] corpus plus a partner directory into `store`.
pub async fn seed_day(store: &FakeStore) {
    for (name, text, gzipped) in DAY {
        if *gzipped {
            store.add_gzip(DATE, name, text).await;
        } else {
            store.add_text(DATE, name, text).await;
        }
    }
    store.add_partner(442, "24Bottles", "1507", true).await;
    store.add_partner(17, "Old Partner", "0042", false).await;
}
