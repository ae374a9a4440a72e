//! Counter extraction: normalised log text in, [`CounterSet`] out.
//!
//! Every [`CounterKind`] owns a rule chain: an ordered list of
//! [`ExtractionRule`]s, most specific phrasing first. The first rule that
//! matches at least once decides the value; later rules (English or older
//! phrasings of the same line) are only consulted when the earlier ones
//! match nothing. A chain that matches nothing yields `0`.
//!
//! Each rule carries an [`AggregationMode`]:
//!
//! - [`AggregationMode::Sum`] adds every match (one line per import batch).
//! - [`AggregationMode::Max`] keeps the largest match (progress lines that
//!   repeat the same quantity while it advances, e.g. `0/305` … `305/305`).
//!
//! The built-in table lives in [`BUILTIN_RULES`] as plain data; extra rules
//! from configuration are merged with [`RuleTable::with_rules`].

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::strategy::StrategyChain;
use crate::types::{CounterKind, CounterSet};

/// Capture group shared by the built-in patterns: a number with optional
/// thousands separators, optionally followed by `/total`.
pub const NUMBER: &str = r"(\d[\d.,]*(?:\s*/\s*\d[\d.,]*)?)";

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// How the matches of one rule combine into a counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    Sum,
    Max,
}

/// Where a configured rule goes in its counter's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulePosition {
    /// Tried before the built-in rules.
    Prepend,
    /// Tried after the built-in rules.
    #[default]
    Append,
}

/// A rule as written in configuration (`[[extraction.rules]]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    pub counter: String,
    /// Regular expression with one capture group holding the number. The
    /// `{NUMBER}` placeholder expands to [`NUMBER`].
    pub pattern: String,
    pub mode: AggregationMode,
    #[serde(default)]
    pub position: RulePosition,
}

/// A compiled extraction rule.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pattern: Regex,
    mode: AggregationMode,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid pattern for {counter}: {source}")]
    Pattern {
        counter: String,
        #[source]
        source: regex::Error,
    },
    #[error("pattern for {counter} has no capture group: {pattern}")]
    NoCapture { counter: String, pattern: String },
    #[error("unknown counter kind: {0}")]
    UnknownCounter(String),
}

impl ExtractionRule {
    /// Compile `pattern` case-insensitively with `^`/`$` matching at line
    /// boundaries.
    pub fn new(kind: CounterKind, pattern: &str, mode: AggregationMode) -> Result<Self, RuleError> {
        let expanded = pattern.replace("{NUMBER}", NUMBER);
        let regex = RegexBuilder::new(&expanded)
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .map_err(|source| RuleError::Pattern {
                counter: kind.to_string(),
                source,
            })?;
        if regex.captures_len() < 2 {
            return Err(RuleError::NoCapture {
                counter: kind.to_string(),
                pattern: expanded,
            });
        }
        Ok(Self {
            pattern: regex,
            mode,
        })
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Apply this rule to `text`. Returns `None` when nothing matched (so the
    /// chain falls through), else the combined value and the matched snippets
    /// in source order.
    pub fn apply(&self, text: &str) -> Option<(u64, Vec<String>)> {
        let mut value: Option<u64> = None;
        let mut snippets = Vec::new();

        for caps in self.pattern.captures_iter(text) {
            let Some(n) = caps.get(1).and_then(|g| parse_count(g.as_str())) else {
                continue;
            };
            value = Some(match (self.mode, value) {
                (_, None) => n,
                (AggregationMode::Sum, Some(acc)) => acc.saturating_add(n),
                (AggregationMode::Max, Some(acc)) => acc.max(n),
            });
            if let Some(whole) = caps.get(0) {
                snippets.push(whole.as_str().trim().to_string());
            }
        }

        value.map(|v| (v, snippets))
    }
}

/// Parse a captured count.
///
/// `current/total` notation yields the total; otherwise the first digit run
/// is used with `.` and `,` thousands separators removed.
pub fn parse_count(raw: &str) -> Option<u64> {
    let part = match raw.rsplit_once('/') {
        Some((_, total)) => total,
        None => raw,
    };
    let start = part.find(|c: char| c.is_ascii_digit())?;
    let digits: String = part[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

/// `(counter, [(pattern, mode), ...])`, most specific pattern first.
pub const BUILTIN_RULES: &[(CounterKind, &[(&str, AggregationMode)])] = &[
    (
        CounterKind::InError,
        &[
            (r"prodotti\s+in\s+errore\s+google\s*:\s*{NUMBER}", AggregationMode::Sum),
            (r"products\s+in\s+error\s+(?:on\s+)?google\s*:\s*{NUMBER}", AggregationMode::Sum),
        ],
    ),
    (
        CounterKind::ToAdd,
        &[
            (r"prodotti\s+da\s+aggiungere\s*:\s*{NUMBER}", AggregationMode::Sum),
            (r"products\s+to\s+add\s*:\s*{NUMBER}", AggregationMode::Sum),
        ],
    ),
    (
        CounterKind::ToUpdate,
        &[
            (r"prodotti\s+da\s+aggiornare\s+su\s+google\s*:?\s*{NUMBER}", AggregationMode::Sum),
            (r"to\s+update\s+on\s+google\s*:?\s*{NUMBER}", AggregationMode::Sum),
        ],
    ),
    (
        CounterKind::ModifiedToSend,
        &[
            (
                r"preparazione\s+json\s+prodotti\s+modificati\s+da\s+mandare\s+a\s+google[^\n\d]*{NUMBER}",
                AggregationMode::Max,
            ),
            (
                r"fine\s+prodotti\s+modificati\s+da\s+mandare\s+a\s+google\s*:?\s*{NUMBER}",
                AggregationMode::Max,
            ),
            (
                r"end\s+of\s+modified\s+products\s+to\s+send(?:\s+to\s+google)?\s*:?\s*{NUMBER}",
                AggregationMode::Max,
            ),
        ],
    ),
    (
        CounterKind::DeletedToSend,
        &[
            (
                r"preparazione\s+json\s+prodotti\s+cancellati\s+da\s+mandare\s+a\s+google[^\n\d]*{NUMBER}",
                AggregationMode::Max,
            ),
            (r"prodotti\s+da\s+cancellare\s*:?\s*{NUMBER}", AggregationMode::Sum),
            (r"products\s+to\s+delete\s*:?\s*{NUMBER}", AggregationMode::Sum),
            (
                r"fine\s+prodotti\s+cancellati\s+da\s+mandare\s+a\s+google\s*:?\s*{NUMBER}",
                AggregationMode::Max,
            ),
            (
                r"end\s+of\s+deleted\s+products\s+to\s+send(?:\s+to\s+google)?\s*:?\s*{NUMBER}",
                AggregationMode::Max,
            ),
            // Progress line within five lines of the deletion header.
            (
                r"prodotti\s+cancellati\s+da\s+mandare\s+a\s+google[^\n]*\n(?:[^\n]*\n){0,4}?[^\n]*?(?:avanzamento|progress)\s+{NUMBER}",
                AggregationMode::Max,
            ),
        ],
    ),
];

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Compiled rule chains for every counter kind.
#[derive(Debug, Clone)]
pub struct RuleTable {
    chains: BTreeMap<CounterKind, StrategyChain<ExtractionRule>>,
}

impl RuleTable {
    /// Compile [`BUILTIN_RULES`].
    pub fn builtin() -> Result<Self, RuleError> {
        let mut chains = BTreeMap::new();
        for kind in CounterKind::ALL {
            chains.insert(kind, StrategyChain::new(Vec::new()));
        }
        for (kind, rules) in BUILTIN_RULES {
            let chain = chains.entry(*kind).or_insert_with(|| StrategyChain::new(Vec::new()));
            for (pattern, mode) in rules.iter() {
                chain.push(ExtractionRule::new(*kind, pattern, *mode)?);
            }
        }
        Ok(Self { chains })
    }

    /// The built-in table with configured rules merged in.
    pub fn with_rules(specs: &[RuleSpec]) -> Result<Self, RuleError> {
        let mut table = Self::builtin()?;
        // Prepended rules keep their configured order.
        for spec in specs.iter().rev().filter(|s| s.position == RulePosition::Prepend) {
            let (kind, rule) = compile_spec(spec)?;
            table.chain_mut(kind).prepend(rule);
        }
        for spec in specs.iter().filter(|s| s.position == RulePosition::Append) {
            let (kind, rule) = compile_spec(spec)?;
            table.chain_mut(kind).push(rule);
        }
        Ok(table)
    }

    fn chain_mut(&mut self, kind: CounterKind) -> &mut StrategyChain<ExtractionRule> {
        self.chains
            .entry(kind)
            .or_insert_with(|| StrategyChain::new(Vec::new()))
    }

    pub fn chain(&self, kind: CounterKind) -> Option<&StrategyChain<ExtractionRule>> {
        self.chains.get(&kind)
    }

    /// Extract every counter from already-normalised text.
    pub fn extract(&self, text: &str) -> CounterSet {
        let mut set = CounterSet::new();
        for (kind, chain) in &self.chains {
            match chain.first_match(|rule| rule.apply(text)) {
                Some((_, (value, snippets))) => set.record(*kind, value, snippets),
                None => set.record(*kind, 0, Vec::new()),
            }
        }
        set
    }
}

fn compile_spec(spec: &RuleSpec) -> Result<(CounterKind, ExtractionRule), RuleError> {
    let kind: CounterKind = spec
        .counter
        .parse()
        .map_err(|_| RuleError::UnknownCounter(spec.counter.clone()))?;
    let rule = ExtractionRule::new(kind, &spec.pattern, spec.mode)?;
    Ok((kind, rule))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
