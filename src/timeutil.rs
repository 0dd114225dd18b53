use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{CdLensError, Result};

/// Truncate a timestamp to midnight of its UTC day.
pub fn floor_to_day(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Render a timestamp the way the GitLab API expects date filters:
/// day granularity, explicit UTC offset.
pub fn api_date_string(timestamp: DateTime<Utc>) -> String {
    floor_to_day(timestamp)
        .format("%Y-%m-%dT%H:%M:%S%.3f+00:00")
        .to_string()
}

/// Normalized human-readable form used in timeline output lines.
pub fn normalize_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a `YYYY-MM-DD` day (or a full RFC 3339 timestamp) into a UTC
/// timestamp at day granularity for the day form.
pub fn parse_day(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CdLensError::Config(format!("Cannot parse date '{raw}': {e}")))
}
