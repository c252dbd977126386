//! Shared pieces of the per-dialect data converters.
//!
//! Classification runs ordered, case-insensitive patterns over the native
//! type string: number, datetime, date, time, else string. The first match
//! wins, so `datetime` is never classified as a plain date.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use super::canonical::DataType;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)int|double|float|number|decimal|byte|bit").expect("valid number pattern")
});

static DATETIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)datetime|timestamp").expect("valid datetime pattern"));

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)date").expect("valid date pattern"));

static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)time").expect("valid time pattern"));

/// Coarse category of a native column type string.
pub fn classify_type(native: &str) -> DataType {
    if NUMBER.is_match(native) {
        DataType::Number
    } else if DATETIME.is_match(native) {
        DataType::DateTime
    } else if DATE.is_match(native) {
        DataType::Date
    } else if TIME.is_match(native) {
        DataType::Time
    } else {
        DataType::String
    }
}

/// `0001-01-01`, the zero date returned for unparseable input.
pub fn zero_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default()
}

pub fn zero_datetime() -> NaiveDateTime {
    zero_date().and_time(NaiveTime::MIN)
}

pub fn zero_datetime_offset() -> DateTime<FixedOffset> {
    zero_datetime().and_utc().fixed_offset()
}

/// Parse a date, or return the zero date.
pub fn parse_date_or_zero(text: &str, layout: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text.trim(), layout).unwrap_or_else(|_| zero_date())
}

/// Parse a time of day, or return midnight.
pub fn parse_time_or_zero(text: &str, layout: &str) -> NaiveTime {
    NaiveTime::parse_from_str(text.trim(), layout).unwrap_or(NaiveTime::MIN)
}

/// Parse a local timestamp, or return the zero timestamp.
pub fn parse_datetime_or_zero(text: &str, layout: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text.trim(), layout).unwrap_or_else(|_| zero_datetime())
}

/// Parse an RFC 3339 timestamp, or return the zero timestamp in UTC.
pub fn parse_rfc3339_or_zero(text: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(text.trim()).unwrap_or_else(|_| zero_datetime_offset())
}
