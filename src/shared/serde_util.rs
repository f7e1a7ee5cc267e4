//! Parsers for the broker's date and timestamp formats.

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a timeline timestamp such as `2023-11-20T15:33:05.114+0000`.
///
/// The offset has no colon, so this is not RFC 3339; plain RFC 3339 is
/// accepted as well.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a document date such as `20.11.2023`.
pub fn parse_document_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%d.%m.%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_timestamp_without_colon_offset() {
        let ts = parse_timestamp("2023-11-20T15:33:05.114+0100").unwrap();
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.timestamp_subsec_millis(), 114);
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        assert!(parse_timestamp("2023-11-20T15:33:05Z").is_some());
        assert!(parse_timestamp("20.11.2023").is_none());
    }

    #[test]
    fn test_parse_document_date() {
        let d = parse_document_date("05.02.2024").unwrap();
        assert_eq!((d.day(), d.month(), d.year()), (5, 2, 2024));
        assert!(parse_document_date("2024-02-05").is_none());
    }
}
