//! Shared type coercion for raw string input.
//!
//! Query-string values and inbound JSON dates arrive as strings; these helpers
//! turn them into typed values or fail with a [`ConversionError`] naming the
//! offending input.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// A raw value could not be converted to the requested type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot convert '{value}' to {target}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
}

impl ConversionError {
    fn new(value: &str, target: &'static str) -> Self {
        Self {
            value: value.to_string(),
            target,
        }
    }
}

/// Parse a signed integer.
pub fn to_int(raw: &str) -> Result<i64, ConversionError> {
    raw.parse().map_err(|_| ConversionError::new(raw, "integer"))
}

/// Parse a floating point number.
pub fn to_float(raw: &str) -> Result<f64, ConversionError> {
    raw.parse().map_err(|_| ConversionError::new(raw, "float"))
}

/// Parse `true`/`false` (also `1`/`0`).
pub fn to_bool(raw: &str) -> Result<bool, ConversionError> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConversionError::new(raw, "boolean")),
    }
}

/// Parse a calendar date.
///
/// Accepts `YYYY-MM-DD` as well as a full timestamp, in which case the date
/// part of its UTC instant is used.
pub fn to_date(raw: &str) -> Result<NaiveDate, ConversionError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    to_datetime(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| ConversionError::new(raw, "date"))
}

/// Parse a timestamp into UTC.
///
/// RFC 3339 input keeps its offset; a naive `YYYY-MM-DDTHH:MM:SS` is read as
/// UTC; a bare date becomes midnight UTC.
pub fn to_datetime(raw: &str) -> Result<DateTime<Utc>, ConversionError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        && let Some(naive) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(naive.and_utc());
    }
    Err(ConversionError::new(raw, "datetime"))
}

/// Parse a UUID, returned in its canonical hyphenated form.
pub fn to_uuid(raw: &str) -> Result<uuid::Uuid, ConversionError> {
    uuid::Uuid::parse_str(raw).map_err(|_| ConversionError::new(raw, "uuid"))
}
