//! Normalizer: cleans raw log text before counter extraction.
//!
//! Upstream job logs intermittently carry zero-width characters, BOMs and
//! non-breaking spaces that break literal phrase and date-prefix matching.
//! [`normalize`] removes or unifies them:
//!
//! 1. strip invisible code points ([`INVISIBLE`]),
//! 2. map non-breaking spaces to a plain space,
//! 3. unify `\r\n` and lone `\r` to `\n`,
//! 4. collapse runs of horizontal whitespace to a single space.
//!
//! The function is pure and idempotent.

/// Code points removed outright.
pub const INVISIBLE: &[char] = &[
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{200E}', // left-to-right mark
    '\u{200F}', // right-to-left mark
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
    '\u{00AD}', // soft hyphen
];

/// Code points rewritten to a plain space.
pub const NON_BREAKING: &[char] = &['\u{00A0}', '\u{202F}', '\u{2007}'];

fn is_horizontal_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{000B}' | '\u{000C}')
}

/// Normalise raw log text. See the module docs for the exact steps.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_space = false;

    while let Some(c) = chars.next() {
        if INVISIBLE.contains(&c) {
            continue;
        }
        let c = if NON_BREAKING.contains(&c) { ' ' } else { c };

        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
            in_space = false;
            continue;
        }

        if is_horizontal_space(c) {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
            continue;
        }

        in_space = false;
        out.push(c);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
