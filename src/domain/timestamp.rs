//! Slack timestamp handling.
//!
//! Slack identifies messages by `"<seconds>.<microseconds>"` strings such as
//! `"1704067200.123456"`. They are parsed as two integers so no precision is
//! lost to floating point.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::{AppError, Result};

/// Parses a Slack timestamp into a UTC datetime.
///
/// # Errors
/// Returns `InvalidData` for empty or malformed timestamps.
pub fn parse_slack_ts(ts: &str) -> Result<DateTime<Utc>> {
    let (secs, micros) = split_ts(ts).ok_or_else(|| AppError::InvalidData {
        message: format!("Invalid Slack timestamp: '{ts}'"),
    })?;

    DateTime::from_timestamp(secs, micros * 1_000).ok_or_else(|| AppError::InvalidData {
        message: format!("Slack timestamp out of range: '{ts}'"),
    })
}

/// Orders two Slack timestamps by their numeric value.
///
/// Falls back to string comparison when either side does not parse.
#[must_use]
pub fn compare_slack_ts(a: &str, b: &str) -> Ordering {
    match (split_ts(a), split_ts(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => a.cmp(b),
    }
}

/// Converts a unix-seconds value (as used for channel/file creation) to UTC.
#[must_use]
pub fn from_unix_secs(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// Splits `"secs.frac"` into whole seconds and microseconds.
fn split_ts(ts: &str) -> Option<(i64, u32)> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }

    let (whole, frac) = ts.split_once('.').unwrap_or((ts, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let secs = whole.parse::<i64>().ok()?;

    // Right-pad or truncate the fraction to exactly six digits.
    let mut digits: String = frac.chars().take(6).collect();
    while digits.len() < 6 {
        digits.push('0');
    }
    let micros = digits.parse::<u32>().ok()?;

    Some((secs, micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_precision() {
        let dt = parse_slack_ts("1704067200.123456").unwrap();
        assert_eq!(dt.timestamp(), 1_704_067_200);
        assert_eq!(dt.timestamp_subsec_micros(), 123_456);
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-01");
    }

    #[test]
    fn test_parse_short_fraction() {
        let dt = parse_slack_ts("100.1").unwrap();
        assert_eq!(dt.timestamp(), 100);
        assert_eq!(dt.timestamp_subsec_micros(), 100_000);
    }

    #[test]
    fn test_parse_without_fraction() {
        let dt = parse_slack_ts("1704067200").unwrap();
        assert_eq!(dt.timestamp_subsec_micros(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_slack_ts("").is_err());
        assert!(parse_slack_ts("abc").is_err());
        assert!(parse_slack_ts("12.3x").is_err());
        assert!(parse_slack_ts("-5.0").is_err());
    }

    #[test]
    fn test_compare_is_numeric() {
        // Different widths compare wrong as strings but right as numbers.
        assert_eq!(compare_slack_ts("99.5", "100.1"), Ordering::Less);
        assert_eq!(compare_slack_ts("100.2", "100.10"), Ordering::Greater);
        assert_eq!(compare_slack_ts("100.100000", "100.1"), Ordering::Equal);
    }

    #[test]
    fn test_from_unix_secs_ignores_zero() {
        assert!(from_unix_secs(0).is_none());
        assert_eq!(from_unix_secs(1_704_067_200).unwrap().timestamp(), 1_704_067_200);
    }
}
