//! Timestamp normalization: providers deliver milliseconds, nanoseconds,
//! ISO 8601, or date-only timestamps; every adapter converts to integer
//! seconds UTC through this single heuristic so the rest of the pipeline
//! only ever sees one shape.

use chrono::DateTime;

/// Heuristic thresholds for distinguishing timestamp units from a bare
/// integer: values above this are nanoseconds.
const NANOS_THRESHOLD: i64 = 1_000_000_000_000_000;
/// Values above this (and at/below the nanos threshold) are milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalize an integer timestamp of unknown unit to seconds UTC.
///
/// `> 10^15` is treated as nanoseconds, `> 10^12` as milliseconds, otherwise
/// the value is assumed to already be seconds.
#[must_use]
pub fn normalize_epoch(value: i64) -> i64 {
    let magnitude = value.abs();
    if magnitude > NANOS_THRESHOLD {
        value / 1_000_000_000
    } else if magnitude > MILLIS_THRESHOLD {
        value / 1_000
    } else {
        value
    }
}

/// Parse an ISO 8601 string (including a trailing `Z`) or a date-only
/// (`YYYY-MM-DD`) string into seconds UTC.
#[must_use]
pub fn parse_iso_or_date(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_pass_through() {
        assert_eq!(normalize_epoch(1_732_646_400), 1_732_646_400);
    }

    #[test]
    fn milliseconds_are_divided() {
        assert_eq!(normalize_epoch(1_732_646_400_000), 1_732_646_400);
    }

    #[test]
    fn nanoseconds_are_divided() {
        assert_eq!(normalize_epoch(1_732_646_400_000_000_000), 1_732_646_400);
    }

    #[test]
    fn iso_with_trailing_z_is_parsed_as_utc() {
        assert_eq!(
            parse_iso_or_date("2024-11-26T16:00:00Z"),
            Some(1_732_636_800)
        );
    }

    #[test]
    fn date_only_is_parsed_as_midnight_utc() {
        assert_eq!(parse_iso_or_date("2024-11-26"), Some(1_732_579_200));
    }

    #[test]
    fn garbage_input_returns_none() {
        assert_eq!(parse_iso_or_date("not-a-date"), None);
    }
}
