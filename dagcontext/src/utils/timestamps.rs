//! Timestamp helpers for marker records and activity log lines.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Format written into marker records: `YYYY-MM-DD HH:MM:SS.ffffff`.
pub const MARKER_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Prefix format of every activity log line.
pub const LOG_FORMAT: &str = "%m/%d/%Y - %H:%M:%S:";

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the current UTC time formatted for a marker record.
#[must_use]
pub fn marker_timestamp() -> String {
    format_marker(&now_utc())
}

/// Formats a timestamp the way marker records store it.
#[must_use]
pub fn format_marker(dt: &Timestamp) -> String {
    dt.format(MARKER_FORMAT).to_string()
}

/// Returns the current UTC time formatted as an activity log prefix.
#[must_use]
pub fn log_timestamp() -> String {
    now_utc().format(LOG_FORMAT).to_string()
}

/// Parses the content of a marker record back into a timestamp.
///
/// Accepts the marker format as well as RFC 3339, so records written by
/// other tools sharing the directory still parse.
///
/// # Errors
///
/// Returns `TimestampError` if the input cannot be parsed.
pub fn parse_marker_timestamp(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(TimestampError::InvalidFormat(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_marker_round_trip() {
        let now = now_utc();
        let parsed = parse_marker_timestamp(&format_marker(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_parse_marker_rfc3339() {
        let dt = parse_marker_timestamp("2023-10-05T14:30:00Z").unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(matches!(
            parse_marker_timestamp("  "),
            Err(TimestampError::EmptyString)
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_marker_timestamp("yesterday"),
            Err(TimestampError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_log_timestamp_shape() {
        let ts = log_timestamp();
        // 10/05/2023 - 14:30:00:
        assert_eq!(ts.len(), 22);
        assert!(ts.ends_with(':'));
        assert_eq!(&ts[10..13], " - ");
    }
}
