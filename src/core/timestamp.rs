//! Timestamp parsing for raw sample rows.
//!
//! `captured_at` values arrive with mixed precision (whole seconds next to
//! microseconds) and sometimes without an offset. Offset-less values are read
//! in the configured timezone.

use crate::error::{DateFormatError, TimestampError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Offset-aware layouts tried after RFC 3339.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Offset-less layouts.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a `captured_at` value into UTC.
pub fn parse_captured_at(value: &str, tz: Tz) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return Ok(ts.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|ts| ts.with_timezone(&Utc))
                .ok_or_else(|| TimestampError(value.to_string()));
        }
    }

    Err(TimestampError(value.to_string()))
}

/// Parse a plain date or date-time string.
///
/// Accepts `%Y-%m-%d %H:%M:%S`, then `%Y-%m-%d` (midnight).
pub fn parse_date(value: &str) -> Result<NaiveDateTime, DateFormatError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DateFormatError::Unsupported(value.to_string()))
}
