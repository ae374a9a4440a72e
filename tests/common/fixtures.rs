//! Static log corpora used across harnesses.
//!
//! The [`DAY`] corpus is one day of import-daemon output: two files for feed
//! 442 (one gzipped), one noisy file for feed 17 and one maintenance log
//! with no feed id. [`DAY_TOTALS`] holds the counters every stage must agree
//! on.

pub const DATE: &str = "2025-09-03";

pub const FEED_442_MORNING: &str = "\
[06:00:01] importDaemon start feed 442
Prodotti in errore Google: 1
Prodotti da aggiungere: 4
Prodotti da aggiornare su Google: 12
Preparazione JSON prodotti modificati da mandare a Google 0/305
Preparazione JSON prodotti modificati da mandare a Google 305/305
[06:03:12] done
";

pub const FEED_442_EVENING: &str = "\
[18:00:00] importDaemon start feed 442
Prodotti da aggiornare su Google: 8
Prodotti da cancellare: 9
[18:00:40] done
";

/// Windows line endings, a non-breaking space, tabs and a zero-width space.
pub const FEED_17_NOISY: &str = "[07:10:00] importDaemon start feed 17\r\n\
Prodotti\u{00A0}da aggiungere:\t\t5\r\n\
Prodotti in\u{200B} errore Google: 2\r\n\
[07:10:09] done\r\n";

pub const MAINTENANCE: &str = "\
[03:00:00] maintenance window
Prodotti da aggiungere: 2
";

/// English-language log from the newer daemon.
pub const FEED_90_ENGLISH: &str = "\
Products to add: 3
to update on Google: 40
end of modified products to send to google 0/77
Preparazione JSON prodotti cancellati da mandare a Google
batch 1 sent
progress 15/15
";

/// `(name, content, gzipped)` for the whole day.
pub const DAY: &[(&str, &str, bool)] = &[
    ("2025-09-03_importDaemon_feed_442.log", FEED_442_MORNING, false),
    ("2025-09-03_importDaemonNight_feed_442.log.gz", FEED_442_EVENING, true),
    ("2025-09-03_importDaemon_feed_17.log", FEED_17_NOISY, false),
    ("2025-09-03_maintenance.log", MAINTENANCE, false),
];

/// `(counter, total)` over [`DAY`].
pub const DAY_TOTALS: &[(&str, u64)] = &[
    ("in_error", 3),
    ("to_add", 11),
    ("to_update", 20),
    ("modified_to_send", 305),
    ("deleted_to_send", 9),
];

/// `n` distinct artifact names for `DATE`, spread over a few feeds.
pub fn many_names(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("{DATE}_job{i:03}_feed_{}.log", 100 + i % 7))
        .collect()
}
