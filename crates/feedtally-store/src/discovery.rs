//! Discovery: list a day's log artifacts in the remote store.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use feedtally_core::normalizer::normalize;
use feedtally_core::LogArtifact;

use crate::backoff::RetryPolicy;
use crate::client::{Endpoint, StoreClient};
use crate::error::StoreError;
use crate::protocol::{ListResponse, ListedFile, Request};

const LOG_SUFFIXES: [&str; 2] = [".log", ".log.gz"];

/// List the artifacts for `date` under `folder`.
///
/// One attempt only: a failed listing fails the day, and an `ok: false`
/// response is an error rather than an empty day.
pub async fn discover(
    client: &StoreClient,
    folder: &str,
    date: NaiveDate,
) -> Result<Vec<LogArtifact>, StoreError> {
    let resp: ListResponse = client
        .call_ok(
            Endpoint::Reader,
            &Request::ListFiles { folder, date },
            RetryPolicy::once(),
        )
        .await?;
    let listed = resp.files.len();
    let artifacts = select_artifacts(resp.files, date);
    tracing::info!(%date, listed, selected = artifacts.len(), "discovered log artifacts");
    Ok(artifacts)
}

/// Keep `.log`/`.log.gz` files whose name starts with `date`, one entry per
/// normalized name (latest `last_updated` wins), sorted by normalized name.
///
/// Matching and deduplication run on the normalized name; the returned
/// artifact keeps the name exactly as listed so it can be fetched back.
pub fn select_artifacts(files: Vec<ListedFile>, date: NaiveDate) -> Vec<LogArtifact> {
    let prefix = date.format("%Y-%m-%d").to_string();
    let mut by_name: BTreeMap<String, LogArtifact> = BTreeMap::new();

    for file in files {
        let clean = normalize(&file.name);
        let clean = clean.trim();
        let lower = clean.to_ascii_lowercase();
        if !clean.starts_with(&prefix) || !LOG_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            tracing::trace!(file = %file.name, "not a log artifact for this day");
            continue;
        }
        let key = clean.to_string();
        let candidate = LogArtifact {
            name: file.name,
            remote_id: file.id,
            last_updated: file.last_updated,
        };
        match by_name.get(&key) {
            Some(existing) if existing.last_updated >= candidate.last_updated => {}
            _ => {
                by_name.insert(key, candidate);
            }
        }
    }

    by_name.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn listed(name: &str, ts: i64) -> ListedFile {
        ListedFile {
            name: name.to_string(),
            id: None,
            last_updated: ts,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 3).unwrap()
    }

    #[test]
    fn filters_by_date_and_suffix() {
        let out = select_artifacts(
            vec![
                listed("2025-09-03_importDaemon_feed_442.log", 1),
                listed("2025-09-03_importDaemon_feed_17.LOG.GZ", 1),
                listed("2025-09-02_importDaemon_feed_442.log", 1),
                listed("2025-09-03_notes.txt", 1),
                listed("readme.log", 1),
            ],
            day(),
        );
        let names: Vec<_> = out.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2025-09-03_importDaemon_feed_17.LOG.GZ",
                "2025-09-03_importDaemon_feed_442.log",
            ]
        );
    }

    #[test]
    fn duplicates_keep_latest() {
        let out = select_artifacts(
            vec![
                listed("2025-09-03_a_feed_1.log", 10),
                listed("2025-09-03_a_feed_1.log", 30),
                listed("2025-09-03_a_feed_1.log", 20),
            ],
            day(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].last_updated, 30);
    }

    #[test]
    fn invisible_characters_do_not_hide_artifacts() {
        let raw = "\u{FEFF}2025-09-03_importDaemon_feed_442.log\u{200B}";
        let out = select_artifacts(vec![listed(raw, 1)], day());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, raw);
    }

    #[test]
    fn names_differing_only_by_invisible_characters_are_one_artifact() {
        let plain = "2025-09-03_importDaemon_feed_442.log";
        let noisy = "\u{FEFF}2025-09-03_importDaemon_feed_442.log\u{200B}";
        let out = select_artifacts(vec![listed(noisy, 20), listed(plain, 10)], day());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, noisy);
        assert_eq!(out[0].last_updated, 20);
    }
}
