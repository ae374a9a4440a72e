//! Aggregation: per-file [`CounterSet`]s into whole-day totals and
//! per-partner daily rows.
//!
//! Inputs are keyed by artifact name in a `BTreeMap`, so every counter set is
//! attributable to exactly one artifact and iteration order (and therefore
//! the output) is stable across runs.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;

use crate::normalizer::normalize;
use crate::types::{
    CounterSet, CounterTotals, DailyAggregate, FeedId, PartnerDailyRow, PartnerDirectory,
};

/// Extract the feed id from an artifact name following
/// `<YYYY-MM-DD>_<job>_feed_<id>.log[.gz]`. Invisible characters around
/// the name are ignored.
pub fn feed_id_from_name(name: &str) -> Option<FeedId> {
    static FEED: OnceLock<Regex> = OnceLock::new();
    let re = FEED.get_or_init(|| {
        Regex::new(r"(?i)feed[_-](\d+)\.log(?:\.gz)?$").expect("feed id pattern is valid")
    });
    let clean = normalize(name);
    re.captures(clean.trim())?.get(1)?.as_str().parse().ok()
}

/// Label used when the partner directory has no entry for a feed.
pub fn placeholder_partner(feed_id: FeedId) -> String {
    format!("Feed {feed_id}")
}

/// Sum every file's counters into one [`DailyAggregate`].
pub fn aggregate_day(date: NaiveDate, per_file: &BTreeMap<String, CounterSet>) -> DailyAggregate {
    let mut counters = CounterTotals::zeroed();
    for set in per_file.values() {
        counters.absorb(set.totals());
    }
    DailyAggregate {
        date,
        counters,
        contributing_files: per_file.keys().cloned().collect(),
    }
}

/// Per-partner rows plus the artifacts that could not be attributed to a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerAggregation {
    /// One row per feed id, ordered by feed id.
    pub rows: Vec<PartnerDailyRow>,
    /// Artifact names that do not follow the feed naming convention.
    pub unresolved: Vec<String>,
}

/// Group per-file counters by feed id and join them against `directory`.
///
/// Files without a feed id are reported in
/// [`PartnerAggregation::unresolved`]; feeds without a directory entry get a
/// [`placeholder_partner`] label and an empty code.
pub fn aggregate_partners(
    date: NaiveDate,
    per_file: &BTreeMap<String, CounterSet>,
    directory: &PartnerDirectory,
    updated_at: DateTime<FixedOffset>,
) -> PartnerAggregation {
    let mut by_feed: BTreeMap<FeedId, (CounterTotals, Vec<String>)> = BTreeMap::new();
    let mut unresolved = Vec::new();

    for (name, set) in per_file {
        let Some(feed_id) = feed_id_from_name(name) else {
            tracing::warn!(file = %name, "artifact name has no feed id; excluded from partner rows");
            unresolved.push(name.clone());
            continue;
        };
        let (totals, files) = by_feed
            .entry(feed_id)
            .or_insert_with(|| (CounterTotals::zeroed(), Vec::new()));
        totals.absorb(set.totals());
        files.push(name.clone());
    }

    let rows = by_feed
        .into_iter()
        .map(|(feed_id, (counters, files))| {
            let (partner_name, code) = match directory.get(feed_id) {
                Some(record) if !record.partner_name.trim().is_empty() => {
                    (record.partner_name.clone(), record.code.clone())
                }
                Some(record) => (placeholder_partner(feed_id), record.code.clone()),
                None => (placeholder_partner(feed_id), String::new()),
            };
            PartnerDailyRow {
                date,
                feed_id,
                partner_name,
                code,
                counters,
                files,
                updated_at,
            }
        })
        .collect();

    PartnerAggregation { rows, unresolved }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CounterKind, PartnerRecord};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 3).unwrap()
    }

    fn stamp() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-09-04T06:00:00+02:00").unwrap()
    }

    fn set(pairs: &[(CounterKind, u64)]) -> CounterSet {
        let mut s = CounterSet::new();
        for (k, v) in pairs {
            s.record(*k, *v, vec![format!("{k}: {v}")]);
        }
        s
    }

    fn files() -> BTreeMap<String, CounterSet> {
        BTreeMap::from([
            (
                "2025-09-03_importDaemon_feed_442.log".to_string(),
                set(&[(CounterKind::ToUpdate, 12), (CounterKind::InError, 1)]),
            ),
            (
                "2025-09-03_importDaemon_feed_442.log.gz".to_string(),
                set(&[(CounterKind::ToUpdate, 8)]),
            ),
            (
                "2025-09-03_importDaemon_feed_17.log".to_string(),
                set(&[(CounterKind::ToAdd, 5)]),
            ),
            ("2025-09-03_maintenance.log".to_string(), set(&[(CounterKind::ToAdd, 2)])),
        ])
    }

    #[rstest]
    #[case("2025-09-03_importDaemon_feed_442.log", Some(442))]
    #[case("2025-09-03_importDaemon_feed_442.log.gz", Some(442))]
    #[case("2025-09-03_importDaemon_feed-7.LOG", Some(7))]
    #[case("\u{FEFF}2025-09-03_importDaemon_feed_442.log\u{200B}", Some(442))]
    #[case("2025-09-03_importDaemon.log", None)]
    #[case("2025-09-03_feed_12.txt", None)]
    fn feed_ids(#[case] name: &str, #[case] expected: Option<FeedId>) {
        assert_eq!(feed_id_from_name(name), expected);
    }

    #[test]
    fn day_totals_are_exact_sums() {
        let agg = aggregate_day(day(), &files());
        assert_eq!(agg.counters.get(CounterKind::ToUpdate), 20);
        assert_eq!(agg.counters.get(CounterKind::ToAdd), 7);
        assert_eq!(agg.counters.get(CounterKind::InError), 1);
        assert_eq!(agg.counters.get(CounterKind::DeletedToSend), 0);
        assert_eq!(agg.contributing_files.len(), 4);
    }

    #[test]
    fn partner_rows_join_directory_and_fall_back_to_placeholder() {
        let directory = PartnerDirectory::new([PartnerRecord {
            feed_id: 442,
            partner_name: "24Bottles".into(),
            code: "1507".into(),
            active: true,
        }]);
        let out = aggregate_partners(day(), &files(), &directory, stamp());

        assert_eq!(out.unresolved, vec!["2025-09-03_maintenance.log".to_string()]);
        assert_eq!(out.rows.len(), 2);

        let feed17 = &out.rows[0];
        assert_eq!(feed17.feed_id, 17);
        assert_eq!(feed17.partner_name, "Feed 17");
        assert_eq!(feed17.code, "");
        assert_eq!(feed17.counters.get(CounterKind::ToAdd), 5);

        let feed442 = &out.rows[1];
        assert_eq!(feed442.partner_name, "24Bottles");
        assert_eq!(feed442.code, "1507");
        assert_eq!(feed442.counters.get(CounterKind::ToUpdate), 20);
        assert_eq!(feed442.files.len(), 2);
    }

    #[test]
    fn invisible_characters_keep_file_in_partner_rows() {
        let name = "\u{FEFF}2025-09-03_importDaemon_feed_442.log\u{200B}".to_string();
        let per_file = BTreeMap::from([(name.clone(), set(&[(CounterKind::ToAdd, 4)]))]);
        let out = aggregate_partners(day(), &per_file, &PartnerDirectory::default(), stamp());

        assert!(out.unresolved.is_empty());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].feed_id, 442);
        assert_eq!(out.rows[0].counters.get(CounterKind::ToAdd), 4);
        assert_eq!(out.rows[0].files, vec![name]);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let directory = PartnerDirectory::default();
        let a = (
            aggregate_day(day(), &files()),
            aggregate_partners(day(), &files(), &directory, stamp()),
        );
        let b = (
            aggregate_day(day(), &files()),
            aggregate_partners(day(), &files(), &directory, stamp()),
        );
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.1.rows).unwrap(),
            serde_json::to_string(&b.1.rows).unwrap()
        );
    }

    #[test]
    fn empty_input_gives_zero_totals() {
        let agg = aggregate_day(day(), &BTreeMap::new());
        assert!(agg.contributing_files.is_empty());
        assert!(agg.counters.iter().all(|(_, v)| v == 0));
        let rows = aggregate_partners(day(), &BTreeMap::new(), &PartnerDirectory::default(), stamp());
        assert!(rows.rows.is_empty());
    }
}
