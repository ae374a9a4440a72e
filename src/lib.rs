//! feedtally: daily counter extraction and per-partner reporting for feed
//! import job logs.
//!
//! For one calendar day the [`Pipeline`] lists the day's log artifacts in
//! the remote store, fetches them in paced batches, extracts the business
//! counters from each file, sums them per day and per partner feed, and
//! upserts the result into the remote tabular store.
//!
//! # Architecture
//!
//! ```text
//! discover ──► BatchFetcher ──► normalize ──► RuleTable::extract
//!                                                   │
//!                          Publisher ◄── aggregate_partners / aggregate_day
//! ```
//!
//! The network-facing stages live in `feedtally-store`; the pure stages live
//! in `feedtally-core`. This crate wires them together and owns the
//! multi-day runner and the CLI.

pub mod dates;
pub mod pipeline;
pub mod report;

pub use pipeline::{Pipeline, PipelineError, PipelineSettings, RunOptions};
pub use report::{render_preview, DayOutcome, DayReport, DaySummary};
