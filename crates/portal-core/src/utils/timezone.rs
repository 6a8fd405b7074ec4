//! Toronto-time helpers. Events are stored in UTC and shown and entered in
//! America/Toronto local time.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::Toronto;
use chrono_tz::Tz;

/// "Wednesday, January 15, 2025 at 2:00 PM EST"
pub const DEFAULT_DISPLAY_FORMAT: &str = "%A, %B %-d, %Y at %-I:%M %p %Z";

/// Format of a `datetime-local` style input: "2025-01-15T14:00"
pub const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC,
/// which is how the backend serializes naive timestamps.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn to_toronto(value: &str) -> Option<DateTime<Tz>> {
    parse_utc(value).map(|dt| dt.with_timezone(&Toronto))
}

/// Format a UTC timestamp in Toronto time with a strftime pattern
pub fn format_in_toronto(value: &str, format: &str) -> Option<String> {
    to_toronto(value).map(|dt| dt.format(format).to_string())
}

/// UTC timestamp to the Toronto-local input form; empty for missing values
pub fn format_for_input(value: Option<&str>) -> String {
    value
        .and_then(|v| format_in_toronto(v, INPUT_FORMAT))
        .unwrap_or_default()
}

/// Toronto-local "YYYY-MM-DDTHH:mm" to a UTC ISO-8601 string.
///
/// Returns `None` for malformed input or for a wall-clock time skipped by a
/// DST transition. Ambiguous times resolve to the earlier instant.
pub fn toronto_local_to_utc(local: &str) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(local.trim(), INPUT_FORMAT).ok()?;
    let zoned = Toronto.from_local_datetime(&naive).earliest()?;
    Some(
        zoned
            .with_timezone(&Utc)
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    )
}
