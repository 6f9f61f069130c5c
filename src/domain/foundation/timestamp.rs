//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Months, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Creates a timestamp from Unix seconds, `None` when out of range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Parses an RFC3339 string (any offset) into UTC.
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value.trim())
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Formats as RFC3339 with second precision and a `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Formats as a calendar date, e.g. `2025-01-01`.
    pub fn to_date_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Seconds elapsed from `other` to `self`; negative if `other` is later.
    pub fn seconds_since(&self, other: &Timestamp) -> i64 {
        self.0.signed_duration_since(other.0).num_seconds()
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    /// Adds calendar months, clamping to the end of shorter months.
    pub fn plus_months(&self, months: u32) -> Self {
        Self(
            self.0
                .checked_add_months(Months::new(months))
                .unwrap_or(self.0),
        )
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_unix_secs_formats_as_utc_rfc3339() {
        let ts = Timestamp::from_unix_secs(1_735_689_600).unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn parse_rfc3339_normalizes_offset_to_utc() {
        let ts = Timestamp::parse_rfc3339("2025-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn parse_rfc3339_rejects_garbage() {
        assert!(Timestamp::parse_rfc3339("yesterday").is_none());
        assert!(Timestamp::parse_rfc3339("").is_none());
    }

    #[test]
    fn seconds_since_is_signed() {
        let a = Timestamp::from_unix_secs(1000).unwrap();
        let b = Timestamp::from_unix_secs(1600).unwrap();
        assert_eq!(b.seconds_since(&a), 600);
        assert_eq!(a.seconds_since(&b), -600);
    }

    #[test]
    fn plus_months_clamps_to_month_end() {
        let ts = Timestamp::parse_rfc3339("2025-01-31T12:00:00Z").unwrap();
        assert_eq!(ts.plus_months(1).to_rfc3339(), "2025-02-28T12:00:00Z");
    }

    #[test]
    fn to_date_string_drops_time() {
        let ts = Timestamp::from_unix_secs(1_735_689_600).unwrap();
        assert_eq!(ts.to_date_string(), "2025-01-01");
    }

    #[test]
    fn timestamp_serializes_to_json() {
        let ts = Timestamp::parse_rfc3339("2024-01-15T10:30:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15T10:30:00"));
    }
}
