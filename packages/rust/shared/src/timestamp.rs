//! Centralized publish-date parsing.
//!
//! Feed entries, scraped page metadata, cached text headers, and CLI date
//! bounds all go through [`parse_timestamp`]. Accepted shapes, in order:
//!
//! 1. RFC 3339 / ISO 8601 with offset (`2025-06-10T14:00:00Z`)
//! 2. RFC 2822 (`Tue, 10 Jun 2025 14:00:00 GMT`), the RSS `pubDate` form
//! 3. Naive ISO date-time (`2025-06-10T14:00:00`, `2025-06-10 14:00:00`), read as UTC
//! 4. A leading `YYYY-MM-DD` or `YYYY/MM/DD` date, read as midnight UTC
//!
//! Anything else is `None`. Callers that need a total order use
//! [`timestamp_or_epoch`], which maps `None` to the Unix epoch so malformed
//! dates sort last and never abort filtering or ranking.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

static LEADING_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})").expect("valid regex"));

/// Parse a free-form publish timestamp into UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive date-times: only the first 19 chars matter (fractional seconds
    // and unknown zone suffixes are dropped).
    let head: String = text.chars().take(19).collect();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&head, fmt) {
            return Some(naive.and_utc());
        }
    }

    let caps = LEADING_DATE.captures(text)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a timestamp, falling back to the Unix epoch sentinel.
pub fn timestamp_or_epoch(text: Option<&str>) -> DateTime<Utc> {
    text.and_then(parse_timestamp)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339() {
        let dt = parse_timestamp("2025-06-10T14:30:00Z").expect("rfc3339");
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.hour(), 14);

        let dt = parse_timestamp("2025-06-10T14:30:00+02:00").expect("offset");
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn parses_rfc2822_pub_date() {
        let dt = parse_timestamp("Tue, 10 Jun 2025 14:00:00 +0000").expect("rfc2822");
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 10);
    }

    #[test]
    fn parses_naive_and_date_only() {
        let dt = parse_timestamp("2024-01-05 08:15:00").expect("naive");
        assert_eq!(dt.minute(), 15);

        let dt = parse_timestamp("2024-01-05T08:15:00.123456").expect("fractional");
        assert_eq!(dt.hour(), 8);

        let dt = parse_timestamp("2024/03/07").expect("slashes");
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 7));

        let dt = parse_timestamp("2024-03-07 (updated)").expect("leading date");
        assert_eq!(dt.day(), 7);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("last week").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
    }

    #[test]
    fn epoch_sentinel() {
        assert_eq!(timestamp_or_epoch(None), DateTime::UNIX_EPOCH);
        assert_eq!(timestamp_or_epoch(Some("N/A")), DateTime::UNIX_EPOCH);
        assert!(timestamp_or_epoch(Some("2020-01-01")) > DateTime::UNIX_EPOCH);
    }
}
