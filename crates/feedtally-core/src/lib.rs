//! feedtally-core: pure domain logic for feedtally.
//!
//! This crate holds everything that does not touch the network: the shared
//! types, the text normalizer, the rule-driven counter extractor, the
//! aggregator and the configuration.
//!
//! # Pipeline
//!
//! ```text
//! Discovery ──► Fetcher ──► Normalizer ──► Extractor ──► Aggregator ──► Publisher
//!   (store)      (store)      (core)         (core)        (core)        (store)
//! ```
//!
//! Each stage consumes the complete output of the previous one for a single
//! day; nothing is cached across days.

pub mod aggregate;
pub mod config;
pub mod extract;
pub mod normalizer;
pub mod strategy;
pub mod types;

pub use types::{
    CounterKind, CounterSet, CounterTotals, DailyAggregate, DailyTotalsRow, FeedId,
    FetchedContent, LogArtifact, PartnerDailyRow, PartnerDirectory, PartnerRecord,
};
