use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use chrono::NaiveDate;
use feedtally_core::aggregate::PartnerAggregation;
use feedtally_core::{CounterKind, CounterSet, DailyAggregate};
use feedtally_store::PublishReport;

/// Snippets shown per counter in a preview.
const PREVIEW_SNIPPETS: usize = 3;

/// What happened to one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    pub date: NaiveDate,
    pub outcome: DayOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    /// The store listed no artifacts for the day; nothing was published.
    Skipped,
    Completed(Box<DaySummary>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    /// Artifacts discovered for the day.
    pub files_total: usize,
    /// Artifacts that could not be fetched or decoded after every retry.
    pub missing: Vec<String>,
    pub per_file: BTreeMap<String, CounterSet>,
    pub aggregate: DailyAggregate,
    pub partners: PartnerAggregation,
    /// One entry per table written; empty for previews.
    pub published: Vec<PublishReport>,
}

impl DaySummary {
    pub fn files_used(&self) -> usize {
        self.per_file.len()
    }
}

impl DayReport {
    pub fn skipped(date: NaiveDate) -> Self {
        Self {
            date,
            outcome: DayOutcome::Skipped,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, DayOutcome::Skipped)
    }

    pub fn summary(&self) -> Option<&DaySummary> {
        match &self.outcome {
            DayOutcome::Skipped => None,
            DayOutcome::Completed(summary) => Some(summary),
        }
    }
}

impl fmt::Display for DayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            DayOutcome::Skipped => write!(f, "{}: skipped, nothing to summarize", self.date),
            DayOutcome::Completed(s) => {
                write!(
                    f,
                    "{}: completed with {} of {} files used",
                    self.date,
                    s.files_used(),
                    s.files_total
                )?;
                let failed: usize = s.published.iter().map(|p| p.failed_chunks.len()).sum();
                if failed > 0 {
                    write!(f, " ({failed} upsert chunk(s) failed)")?;
                }
                Ok(())
            }
        }
    }
}

/// Per-file breakdown of a day with a few matching snippets per counter.
pub fn render_preview(summary: &DaySummary) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_preview(summary, &mut out);
    out
}

fn write_preview(summary: &DaySummary, out: &mut String) -> fmt::Result {
    for (name, set) in &summary.per_file {
        writeln!(out, "== {name}")?;
        for kind in CounterKind::ALL {
            writeln!(out, "  {:<18} {}", kind.as_str(), set.get(kind))?;
            for snippet in set.snippets(kind).iter().take(PREVIEW_SNIPPETS) {
                writeln!(out, "      > {snippet}")?;
            }
        }
    }
    if !summary.missing.is_empty() {
        writeln!(out, "== missing ({})", summary.missing.len())?;
        for name in &summary.missing {
            writeln!(out, "  {name}")?;
        }
    }
    writeln!(out, "== totals")?;
    for (kind, value) in summary.aggregate.counters.iter() {
        writeln!(out, "  {:<18} {value}", kind.as_str())?;
    }
    writeln!(out, "== partners")?;
    for row in &summary.partners.rows {
        let counts: Vec<String> = row
            .counters
            .iter()
            .filter(|(_, v)| *v > 0)
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        writeln!(out, "  {:>6}  {:<24} {}", row.feed_id, row.partner_name, counts.join(" "))?;
    }
    Ok(())
}
