//! Calendar helpers. Every date is a civil date in the configured timezone.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;

pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// The default target date: the day before today in `tz`.
pub fn yesterday_in(tz: Tz) -> NaiveDate {
    let today = today_in(tz);
    today.pred_opt().unwrap_or(today)
}

/// Current wall-clock time in `tz`, used to stamp published rows.
pub fn now_in(tz: Tz) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&tz).fixed_offset()
}

/// The `count` days ending at `last` (inclusive), newest first.
pub fn recent_days(last: NaiveDate, count: u32) -> Vec<NaiveDate> {
    (0..count)
        .filter_map(|back| last.checked_sub_days(Days::new(u64::from(back))))
        .collect()
}
