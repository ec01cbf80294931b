//! # Timestamps
//!
//! Lenient parsing and canonical formatting of attempt timestamps.
//!
//! Every timestamp inside the engine is a UTC instant. Input strings may be:
//! - RFC 3339 with `Z` or a numeric offset (`2024-05-01T09:30:00+09:00`)
//! - naive date-times, read as UTC (`2024-05-01T09:30:00`, `2024-05-01 09:30`)
//! - bare dates, read as UTC midnight (`2024-05-01`)
//!
//! Anything else yields `None`; callers treat that as "skip", never as an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// A UTC instant.
pub type Timestamp = DateTime<Utc>;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp string. Returns `None` for empty or unparsable input.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as RFC 3339 with a `Z` suffix.
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
