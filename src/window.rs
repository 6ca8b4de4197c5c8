//! Time window selection for reports

use crate::error::{LogError, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

/// Inclusive bounds in microseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub begin: Option<i64>,
    pub end: Option<i64>,
}

impl TimeWindow {
    pub fn new(begin: Option<i64>, end: Option<i64>) -> Result<Self> {
        if let (Some(b), Some(e)) = (begin, end) {
            if b > e {
                return Err(LogError::malformed(format!(
                    "window begins ({}) after it ends ({})",
                    b, e
                )));
            }
        }
        Ok(Self { begin, end })
    }

    /// Builds a window from optional textual bounds, see [`parse_timestamp`].
    pub fn parse(begin: Option<&str>, end: Option<&str>) -> Result<Self> {
        let begin = begin.map(parse_timestamp).transpose()?;
        let end = end.map(parse_timestamp).transpose()?;
        Self::new(begin, end)
    }
}

/// Parses an ISO-8601 timestamp into microseconds since the Unix epoch.
///
/// Accepts RFC 3339 with an offset (`2024-05-01T09:30:00Z`), a local date
/// and time without offset (`2024-05-01T09:30:00`), or a local date
/// (`2024-05-01`, meaning local midnight).
pub fn parse_timestamp(text: &str) -> Result<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_micros());
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| LogError::malformed(format!("invalid timestamp '{}'", text)))?;

    // Repeated local times resolve to the earlier instant.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_micros())
        .ok_or_else(|| LogError::malformed(format!("'{}' does not exist in local time", text)))
}
