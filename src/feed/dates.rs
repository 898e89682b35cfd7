//! Tolerant feed date parsing.
//!
//! Feeds in the wild carry two broad families of timestamps: RFC-822-style
//! dates in RSS (`Wed, 02 Oct 2024 15:04:05 +0000`) and ISO-8601-style dates
//! in Atom (`2024-10-02T15:04:05Z`). Both parsers are best-effort: anything
//! that deviates from the expected shape yields `None`, never an error.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Fixed pattern the normalized RSS-style tokens are parsed with.
const RSS_PATTERN: &str = "%d %b %Y %H:%M:%S %:z";

/// Ordered ISO-8601-style patterns carrying an explicit offset.
const ISO_OFFSET_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

/// Ordered ISO-8601-style patterns with a literal `Z` designator.
const ISO_ZULU_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%SZ",
    "%Y-%m-%dT%H:%MZ",
    "%Y-%m-%d %H:%MZ",
];

/// Parse an RSS-style date.
///
/// Expects exactly 6 space-separated tokens:
/// `weekday, day month year time zone`. A single-digit day is zero-padded
/// and a zone token longer than 4 characters gets a colon inserted before
/// its last two digits (`+0000` becomes `+00:00`) before the fixed pattern
/// is applied. Any deviation yields `None`.
pub fn parse_rss_date(s: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = s.split(' ').collect();
    if tokens.len() != 6 {
        return None;
    }

    let mut day = tokens[1].to_string();
    if day.len() == 1 {
        day.insert(0, '0');
    }

    let mut zone = tokens[5].to_string();
    if zone.len() > 4 {
        zone.insert(zone.len() - 2, ':');
    }

    let normalized = format!("{} {} {} {} {}", day, tokens[2], tokens[3], tokens[4], zone);
    DateTime::parse_from_str(&normalized, RSS_PATTERN)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an ISO-8601-style date.
///
/// Tries a fixed ordered list of patterns covering `T` and space separators,
/// optional seconds, and offset (`+00:00` / `+0000`) or literal `Z`
/// designators; the first pattern that matches the whole input wins.
pub fn parse_iso_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    for pattern in ISO_OFFSET_PATTERNS {
        if let Ok(dt) = DateTime::parse_from_str(s, pattern) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for pattern in ISO_ZULU_PATTERNS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(naive.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rss_date_basic() {
        let parsed = parse_rss_date("Wed, 02 Oct 2024 15:04:05 +0000").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_rss_date_single_digit_day_padded() {
        let parsed = parse_rss_date("Tue, 1 Oct 2024 08:00:00 +0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_rss_date_offset_applied() {
        let parsed = parse_rss_date("Wed, 02 Oct 2024 15:04:05 +0100").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 14, 4, 5).unwrap());
    }

    #[test]
    fn test_rss_date_not_a_date() {
        assert!(parse_rss_date("not a date").is_none());
    }

    #[test]
    fn test_rss_date_wrong_token_count() {
        assert!(parse_rss_date("02 Oct 2024").is_none());
        assert!(parse_rss_date("Wed, 02 Oct 2024 15:04:05").is_none());
        assert!(parse_rss_date("").is_none());
    }

    #[test]
    fn test_rss_date_unparsable_pieces() {
        assert!(parse_rss_date("Wed, xx Oct 2024 15:04:05 +0000").is_none());
        assert!(parse_rss_date("Wed, 02 Oct 2024 15:04:05 nowhere").is_none());
    }

    #[test]
    fn test_iso_date_extended_with_offset() {
        let parsed = parse_iso_date("2024-10-02T15:04:05+00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 15, 4, 5).unwrap());

        let parsed = parse_iso_date("2024-10-02T15:04:05+0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 13, 4, 5).unwrap());
    }

    #[test]
    fn test_iso_date_zulu() {
        let parsed = parse_iso_date("2024-10-02T15:04:05Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_iso_date_space_separator() {
        let parsed = parse_iso_date("2024-10-02 15:04:05Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_iso_date_optional_seconds() {
        let parsed = parse_iso_date("2024-10-02T15:04Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 10, 2, 15, 4, 0).unwrap());
    }

    #[test]
    fn test_iso_date_garbage() {
        assert!(parse_iso_date("not a date").is_none());
        assert!(parse_iso_date("2024-10-02").is_none());
        assert!(parse_iso_date("").is_none());
    }
}
