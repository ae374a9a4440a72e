//! Assertion helpers for feedtally harnesses.
//!
//! These wrap `pretty_assertions` and name the counter that disagreed, so a
//! failure points at the stage that produced it.

use serde_json::Value;

/// Assert several counters of a `CounterTotals` at once.
///
/// ```rust
/// assert_counters!(agg.counters, to_update = 20, in_error = 3);
/// ```
#[macro_export]
macro_rules! assert_counters {
    ($totals:expr, $($kind:ident = $value:expr),+ $(,)?) => {{
        let totals: &feedtally_core::CounterTotals = &$totals;
        $(
            let kind: feedtally_core::CounterKind = stringify!($kind)
                .parse()
                .expect("known counter kind");
            pretty_assertions::assert_eq!(
                totals.get(kind),
                $value,
                "counter {} mismatch",
                stringify!($kind)
            );
        )+
    }};
}

/// Counter value of a published JSON row.
pub fn row_counter(row: &Value, counter: &str) -> u64 {
    row[counter]
        .as_u64()
        .unwrap_or_else(|| panic!("row has no numeric {counter:?}: {row}"))
}

/// Assert a published row matches `(counter, value)` pairs.
pub fn assert_row_counters(row: &Value, expected: &[(&str, u64)]) {
    for (counter, value) in expected {
        pretty_assertions::assert_eq!(row_counter(row, counter), *value, "counter {counter} in {row}");
    }
}
