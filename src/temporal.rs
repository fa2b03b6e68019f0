// Snapshot Station - Temporal Validator
// Parses and validates the start/end bounds of a query time range

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::TimeRange;

/// Which bound of the range a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Start => f.write_str("start"),
            Bound::End => f.write_str("end"),
        }
    }
}

/// Rejection of a requested time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("Invalid ISO {0} format")]
    InvalidFormat(Bound),

    #[error("Start value cannot be in the future")]
    FutureStart,

    #[error("Start time must be before End time")]
    RangeInverted,
}

/// Parse one ISO-8601 bound. Accepts RFC 3339 (trailing `Z` or an offset),
/// a naive `YYYY-MM-DDTHH:MM:SS[.fff]` timestamp taken as UTC, or a bare date.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }

    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

/// Validate raw start/end bounds into a normalized inclusive range.
///
/// Missing (or empty) bounds default to the minimum/maximum representable
/// instant. The start may not lie strictly after `now`, and after defaulting
/// `start <= end` must hold. Pure function, no I/O.
pub fn validate_range(
    start_raw: Option<&str>,
    end_raw: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TimeRange, RangeError> {
    let start = match start_raw.filter(|s| !s.is_empty()) {
        Some(raw) => {
            let start = parse_instant(raw).ok_or(RangeError::InvalidFormat(Bound::Start))?;
            if start > now {
                return Err(RangeError::FutureStart);
            }
            start
        }
        None => DateTime::<Utc>::MIN_UTC,
    };

    let end = match end_raw.filter(|s| !s.is_empty()) {
        Some(raw) => parse_instant(raw).ok_or(RangeError::InvalidFormat(Bound::End))?,
        None => DateTime::<Utc>::MAX_UTC,
    };

    if start > end {
        return Err(RangeError::RangeInverted);
    }

    Ok(TimeRange { start, end })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_both_bounds_parse() {
        let range = validate_range(
            Some("2026-01-01T00:00:00"),
            Some("2026-01-01T01:00:00"),
            now(),
        )
        .unwrap();

        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(range.end, Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_trailing_z_is_utc() {
        let range = validate_range(Some("2026-01-01T00:00:00Z"), None, now()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_date_only_bound() {
        let range = validate_range(Some("2026-01-01"), None, now()).unwrap();
        assert_eq!(
            range.start,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_bounds_default_to_unbounded() {
        let range = validate_range(None, None, now()).unwrap();

        assert_eq!(range.start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(range.end, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let range = validate_range(Some(""), Some(""), now()).unwrap();

        assert_eq!(range.start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(range.end, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_malformed_start() {
        let err = validate_range(Some("invalid-iso"), None, now()).unwrap_err();
        assert_eq!(err, RangeError::InvalidFormat(Bound::Start));
        assert_eq!(err.to_string(), "Invalid ISO start format");
    }

    #[test]
    fn test_malformed_end() {
        let err = validate_range(None, Some("invalid-iso"), now()).unwrap_err();
        assert_eq!(err, RangeError::InvalidFormat(Bound::End));
        assert_eq!(err.to_string(), "Invalid ISO end format");
    }

    #[test]
    fn test_inverted_range() {
        let err = validate_range(
            Some("2026-01-01T00:00:00"),
            Some("2025-01-01T00:00:00"),
            now(),
        )
        .unwrap_err();

        assert_eq!(err, RangeError::RangeInverted);
    }

    #[test]
    fn test_start_in_the_future() {
        let err = validate_range(Some("2027-01-01T01:00:00"), None, now()).unwrap_err();
        assert_eq!(err, RangeError::FutureStart);
    }

    #[test]
    fn test_start_exactly_now_is_allowed() {
        let range = validate_range(Some("2026-06-01T12:00:00"), None, now()).unwrap();
        assert_eq!(range.start, now());
    }

    #[test]
    fn test_start_equal_to_end_is_allowed() {
        let range = validate_range(
            Some("2026-01-01T00:00:00"),
            Some("2026-01-01T00:00:00"),
            now(),
        )
        .unwrap();

        assert_eq!(range.start, range.end);
    }
}
