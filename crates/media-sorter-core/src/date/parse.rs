use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use regex::Regex;
use thiserror::Error;

use crate::zone::{parse_fixed_offset, TargetZone};

/// `<date time>` followed by `Z` or a `±HH:MM` / `±HHMM` offset.
static ZONED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<datetime>.*\d)\s*(?P<offset>Z|[+-]\d{2}:?\d{2})$").unwrap()
});

const EXIF_LAYOUT: &str = "%Y:%m:%d %H:%M:%S%.f";

#[derive(Debug, Error, PartialEq)]
pub enum TimeParseError {
    #[error("could not parse date: {0}")]
    Malformed(String),
    #[error("invalid UTC offset in: {0}")]
    BadOffset(String),
    #[error("{0} does not exist in timezone {1}")]
    NonexistentLocal(String, String),
}

/// Parse a metadata date string.
///
/// An embedded offset (or `Z`) is taken at face value. Otherwise the wall
/// clock is interpreted in `assumed`.
pub fn parse_exif_time(
    raw: &str,
    assumed: &TargetZone,
) -> Result<DateTime<FixedOffset>, TimeParseError> {
    let raw = raw.trim();

    if let Some(caps) = ZONED_RE.captures(raw) {
        let naive = parse_naive(&caps["datetime"])
            .ok_or_else(|| TimeParseError::Malformed(raw.to_string()))?;
        let offset = match &caps["offset"] {
            "Z" => FixedOffset::east_opt(0),
            other => parse_fixed_offset(other),
        }
        .ok_or_else(|| TimeParseError::BadOffset(raw.to_string()))?;
        return offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| TimeParseError::BadOffset(raw.to_string()));
    }

    let naive = parse_naive(raw).ok_or_else(|| TimeParseError::Malformed(raw.to_string()))?;
    assumed
        .localize(&naive)
        .ok_or_else(|| TimeParseError::NonexistentLocal(raw.to_string(), assumed.to_string()))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), EXIF_LAYOUT).ok()
}
