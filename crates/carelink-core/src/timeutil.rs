//! Date/time parsing and local-day arithmetic.
//!
//! All appointment records carry their calendar date as a canonical
//! `YYYY-MM-DD` string and their start time as either a 12-hour
//! (`HH:MM AM/PM`) or 24-hour (`HH:MM`) clock string. This module is the
//! single place that turns those strings into concrete instants.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use thiserror::Error;

/// Date/time parse errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeParseError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("No local instant for {0} {1}")]
    NoLocalInstant(String, String),
}

pub type TimeResult<T> = Result<T, TimeParseError>;

/// Canonical date format used in stored records.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a calendar date from either a plain `YYYY-MM-DD` string or a full
/// RFC 3339 instant (callers sometimes hand us one when they mean the other).
pub fn parse_date(input: &str) -> TimeResult<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Ok(date);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Local).date_naive());
    }
    Err(TimeParseError::InvalidDate(input.to_string()))
}

/// Normalize a date string to canonical `YYYY-MM-DD` form.
pub fn normalize_date(input: &str) -> TimeResult<String> {
    Ok(parse_date(input)?.format(DATE_FORMAT).to_string())
}

/// Parse a clock time in 12-hour (`10:00 AM`) or 24-hour (`14:30`) form.
/// AM/PM matching is case-insensitive.
pub fn parse_clock_time(input: &str) -> TimeResult<NaiveTime> {
    let trimmed = input.trim().to_uppercase();
    if let Ok(time) = NaiveTime::parse_from_str(&trimmed, "%I:%M %p") {
        return Ok(time);
    }
    if let Ok(time) = NaiveTime::parse_from_str(&trimmed, "%H:%M") {
        return Ok(time);
    }
    Err(TimeParseError::InvalidTime(input.to_string()))
}

/// Resolve a date + time string pair to a local instant.
///
/// DST gaps can make a wall-clock time nonexistent; ambiguous times resolve
/// to the earlier instant.
pub fn local_instant(date: &str, time: &str) -> TimeResult<DateTime<Local>> {
    let day = parse_date(date)?;
    let clock = parse_clock_time(time)?;
    Local
        .from_local_datetime(&day.and_time(clock))
        .earliest()
        .ok_or_else(|| TimeParseError::NoLocalInstant(date.to_string(), time.to_string()))
}

/// Whether a stored date string falls on the same local calendar day as `now`.
pub fn is_same_local_day(date: &str, now: DateTime<Local>) -> TimeResult<bool> {
    Ok(parse_date(date)? == now.date_naive())
}

/// Format a local instant as RFC 3339 (the stored timestamp form).
pub fn format_instant(instant: DateTime<Local>) -> String {
    instant.to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp back to a local instant.
pub fn parse_instant(input: &str) -> TimeResult<DateTime<Local>> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|t| t.with_timezone(&Local))
        .map_err(|_| TimeParseError::InvalidDate(input.to_string()))
}
