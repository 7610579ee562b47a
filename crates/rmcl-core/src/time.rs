//! RFC3339 helpers matching the wire protocol's tolerant-on-input,
//! strict-on-output contract: fractional seconds must be accepted when
//! parsing but are never emitted when formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// The exact format this system writes timestamps in: `YYYY-MM-DDTHH:MM:SSZ`.
pub const RFC3339_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The current UTC instant.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses an RFC3339 timestamp, tolerating (and discarding) fractional
/// seconds and either a `Z` suffix or an explicit offset.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Formats a timestamp the way this system writes it on output: no
/// fractional seconds, `Z` suffix.
pub fn format_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
