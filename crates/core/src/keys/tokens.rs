//! Sortable timestamp tokens.
//!
//! Sort keys compare as byte strings, so every time component must be
//! rendered with a fixed width for lexical order to match chronological order.

use chrono::NaiveDate;

/// Renders a date as `YYYYMMDD`.
pub fn date_token(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Renders a sequence number zero-padded to 10 digits.
pub fn sequence_token(n: u64) -> String {
    format!("{n:010}")
}
