// src/ingest/dates.rs
use chrono::{DateTime, Utc};
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};

use crate::error::FeedError;

/// Parse a feed publish date into UTC.
///
/// RSS uses RFC 2822 (`pubDate`), Atom uses RFC 3339 (`updated`). The strict
/// `time` parsers run first; chrono's RFC 2822 parser is the fallback because
/// it accepts legacy zone names (`EST`, `PDT`) that real feeds still emit.
/// Anything else is a `DateParse` error and the entry is dropped.
pub fn parse_published(raw: &str) -> Result<DateTime<Utc>, FeedError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(FeedError::DateParse(String::new()));
    }

    let strict = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond()));
    if let Some(dt) = strict {
        return Ok(dt);
    }

    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| FeedError::DateParse(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc2822_with_offset() {
        let dt = parse_published("Fri, 05 Jan 2024 10:00:00 +0100").expect("rfc2822");
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap());
    }

    #[test]
    fn rfc2822_with_gmt_and_legacy_zone() {
        let gmt = parse_published("Fri, 05 Jan 2024 10:00:00 GMT").expect("gmt");
        assert_eq!(gmt, Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap());

        let est = parse_published("Fri, 05 Jan 2024 10:00:00 EST").expect("est");
        assert_eq!(est, Utc.with_ymd_and_hms(2024, 1, 5, 15, 0, 0).unwrap());
    }

    #[test]
    fn rfc3339_atom_dates() {
        let dt = parse_published("  2024-01-05T10:00:00Z \n").expect("rfc3339");
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap());

        let off = parse_published("2024-01-05T10:00:00.500-02:00").expect("rfc3339 offset");
        assert_eq!(off.timestamp(), Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn garbage_is_an_error_not_now() {
        assert!(matches!(parse_published("yesterday"), Err(FeedError::DateParse(_))));
        assert!(matches!(parse_published("   "), Err(FeedError::DateParse(_))));
        assert!(parse_published("2024-13-45T99:00:00Z").is_err());
    }
}
