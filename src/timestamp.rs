//! Sale timestamps.
//!
//! New records are written as RFC 3339 local time with whole seconds.
//! Older databases hold ISO dates, ISO datetimes and the `en-US` locale form
//! `"09/05/2024, 02:03:11 PM"`; all of them parse back to the local wall-clock
//! time the sale happened at.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat};

const LOCALE_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";
const ISO_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

pub fn format(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parses any stored sale timestamp into the local time it was recorded at.
pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    for fmt in ISO_DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    NaiveDateTime::parse_from_str(raw, LOCALE_FORMAT).ok()
}
