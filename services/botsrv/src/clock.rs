//! Local time helpers
//!
//! Timestamps shown to operators use a fixed UTC offset from configuration.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::DEFAULT_ALERT_DATE_FORMAT;
use crate::error::{BotError, Result};

/// Parse `+08:00`, `-0530`, `+8` or `Z` into a fixed offset
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| bad_offset(raw));
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(bad_offset(raw)),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };

    let hours: i32 = hours.parse().map_err(|_| bad_offset(raw))?;
    let minutes: i32 = minutes.parse().map_err(|_| bad_offset(raw))?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(bad_offset(raw));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| bad_offset(raw))
}

fn bad_offset(raw: &str) -> BotError {
    BotError::Config(format!("invalid APP_TIMEZONE_OFFSET '{}'", raw))
}

pub fn now_local(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// `M/D/YYYY HH:MM:SS`, as written to the sync log sheet
pub fn run_log_timestamp(at: DateTime<FixedOffset>) -> String {
    at.format("%-m/%-d/%Y %H:%M:%S").to_string()
}

/// Format a date with a strftime pattern, falling back to `%Y-%m-%d` when the
/// pattern is empty or invalid
pub fn format_date(at: DateTime<FixedOffset>, pattern: &str) -> String {
    let pattern = pattern.trim();
    if !pattern.is_empty() {
        let mut out = String::new();
        if write!(out, "{}", at.format(pattern)).is_ok() {
            return out;
        }
    }
    at.format(DEFAULT_ALERT_DATE_FORMAT).to_string()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_utc_offset("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("+8").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("08:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }

    #[test]
    fn test_run_log_timestamp_has_no_padding_on_date() {
        let tz = parse_utc_offset("+08:00").unwrap();
        let at = tz.with_ymd_and_hms(2026, 2, 3, 7, 5, 9).unwrap();
        assert_eq!(run_log_timestamp(at), "2/3/2026 07:05:09");
    }

    #[test]
    fn test_format_date_falls_back_on_bad_pattern() {
        let tz = parse_utc_offset("+08:00").unwrap();
        let at = tz.with_ymd_and_hms(2026, 2, 18, 9, 0, 0).unwrap();
        assert_eq!(format_date(at, "%d %b %Y"), "18 Feb 2026");
        assert_eq!(format_date(at, ""), "2026-02-18");
        assert_eq!(format_date(at, "%Q"), "2026-02-18");
    }
}
