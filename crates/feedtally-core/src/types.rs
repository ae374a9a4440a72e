//! Core types for feedtally-core.
//!
//! This module defines the data shared across every pipeline stage: the
//! listed [`LogArtifact`], the per-file [`CounterSet`], the per-day
//! [`DailyAggregate`] and the per-partner [`PartnerDailyRow`] that is
//! published to the remote tabular store.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Integer identifier of an upstream partner feed, encoded in artifact names.
pub type FeedId = u32;

// ---------------------------------------------------------------------------
// Counter kinds
// ---------------------------------------------------------------------------

/// One of the fixed business counters extracted from job logs.
///
/// The canonical names (`in_error`, `to_add`, ...) key the extraction rule
/// table and the columns of the published rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    InError,
    ToAdd,
    ToUpdate,
    ModifiedToSend,
    DeletedToSend,
}

impl CounterKind {
    /// Every counter kind, in column order.
    pub const ALL: [CounterKind; 5] = [
        CounterKind::InError,
        CounterKind::ToAdd,
        CounterKind::ToUpdate,
        CounterKind::ModifiedToSend,
        CounterKind::DeletedToSend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CounterKind::InError => "in_error",
            CounterKind::ToAdd => "to_add",
            CounterKind::ToUpdate => "to_update",
            CounterKind::ModifiedToSend => "modified_to_send",
            CounterKind::DeletedToSend => "deleted_to_send",
        }
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CounterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CounterKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown counter kind: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Totals for every [`CounterKind`]; absent kinds read as zero.
///
/// Serializes as a flat map (`{"in_error": 3, "to_add": 0, ...}`) so it can
/// be flattened into published rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterTotals(BTreeMap<CounterKind, u64>);

impl CounterTotals {
    /// All kinds present, all zero.
    pub fn zeroed() -> Self {
        Self(CounterKind::ALL.into_iter().map(|k| (k, 0)).collect())
    }

    pub fn get(&self, kind: CounterKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn set(&mut self, kind: CounterKind, value: u64) {
        self.0.insert(kind, value);
    }

    pub fn add(&mut self, kind: CounterKind, value: u64) {
        let slot = self.0.entry(kind).or_insert(0);
        *slot = slot.saturating_add(value);
    }

    /// Add every counter of `other` into `self`.
    pub fn absorb(&mut self, other: &CounterTotals) {
        for (kind, value) in &other.0 {
            self.add(*kind, *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CounterKind, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Counters extracted from one artifact, plus the raw text snippets that
/// produced each value.
///
/// Produced by [`crate::extract::RuleTable::extract`]; two extractions of the
/// same text compare equal, snippet order included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSet {
    totals: CounterTotals,
    snippets: BTreeMap<CounterKind, Vec<String>>,
}

impl CounterSet {
    pub fn new() -> Self {
        Self {
            totals: CounterTotals::zeroed(),
            snippets: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: CounterKind) -> u64 {
        self.totals.get(kind)
    }

    /// Snippets that contributed to `kind`, in match order. Empty when the
    /// rule chain matched nothing.
    pub fn snippets(&self, kind: CounterKind) -> &[String] {
        self.snippets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn totals(&self) -> &CounterTotals {
        &self.totals
    }

    /// Store the final value of `kind` with its audit trail, replacing any
    /// previous value.
    pub fn record(&mut self, kind: CounterKind, value: u64, snippets: Vec<String>) {
        self.totals.set(kind, value);
        if snippets.is_empty() {
            self.snippets.remove(&kind);
        } else {
            self.snippets.insert(kind, snippets);
        }
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// One log file listed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArtifact {
    /// File name as stored remotely, e.g. `2025-09-03_importDaemon_feed_442.log.gz`.
    pub name: String,
    /// Store-side identifier, when the listing provides one.
    pub remote_id: Option<String>,
    /// Last update time in epoch milliseconds.
    pub last_updated: i64,
}

/// Raw payload of one artifact as returned by a batch fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub name: String,
    pub raw_bytes: Vec<u8>,
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Whole-day totals across every artifact that was fetched and parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub counters: CounterTotals,
    /// Names of the artifacts summed into `counters`, sorted.
    pub contributing_files: Vec<String>,
}

/// Partner metadata supplied by the external partner directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRecord {
    pub feed_id: FeedId,
    #[serde(rename = "partner")]
    pub partner_name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Lookup table of [`PartnerRecord`]s keyed by feed id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnerDirectory {
    records: BTreeMap<FeedId, PartnerRecord>,
}

impl PartnerDirectory {
    pub fn new(records: impl IntoIterator<Item = PartnerRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.feed_id, r)).collect(),
        }
    }

    pub fn get(&self, feed_id: FeedId) -> Option<&PartnerRecord> {
        self.records.get(&feed_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One published row: a partner's counters for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDailyRow {
    pub date: NaiveDate,
    pub feed_id: FeedId,
    #[serde(rename = "partner")]
    pub partner_name: String,
    pub code: String,
    #[serde(flatten)]
    pub counters: CounterTotals,
    /// Names of the artifacts that fed this row, sorted.
    pub files: Vec<String>,
    pub updated_at: DateTime<FixedOffset>,
}

/// The whole-day totals as a publishable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotalsRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counters: CounterTotals,
    pub file_count: usize,
    pub files: Vec<String>,
    pub updated_at: DateTime<FixedOffset>,
}

impl DailyTotalsRow {
    pub fn from_aggregate(aggregate: &DailyAggregate, updated_at: DateTime<FixedOffset>) -> Self {
        Self {
            date: aggregate.date,
            counters: aggregate.counters.clone(),
            file_count: aggregate.contributing_files.len(),
            files: aggregate.contributing_files.clone(),
            updated_at,
        }
    }
}
