use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<sign>[+-])(?P<hh>\d{2}):?(?P<mm>\d{2})$").unwrap());

#[derive(Debug, Error)]
#[error("invalid timezone format: {0}")]
pub struct ZoneError(pub String);

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `-HHMM` into a fixed offset.
pub fn parse_fixed_offset(s: &str) -> Option<FixedOffset> {
    let caps = OFFSET_RE.captures(s)?;
    let hh: i32 = caps["hh"].parse().ok()?;
    let mm: i32 = caps["mm"].parse().ok()?;
    if hh > 23 || mm > 59 {
        return None;
    }
    let secs = hh * 3600 + mm * 60;
    if &caps["sign"] == "-" {
        FixedOffset::west_opt(secs)
    } else {
        FixedOffset::east_opt(secs)
    }
}

/// The zone every wall-clock value is normalized into.
///
/// Resolved once from configuration and treated as opaque afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetZone {
    /// IANA zone such as `Asia/Shanghai` or `UTC`
    Named(Tz),
    /// Fixed UTC offset such as `+08:00`
    Fixed(FixedOffset),
    /// Whatever the host system is configured with
    Local,
}

impl TargetZone {
    /// UTC offset in effect in this zone at `instant`.
    pub fn offset_at(&self, instant: &DateTime<Utc>) -> FixedOffset {
        let naive = instant.naive_utc();
        match self {
            TargetZone::Named(tz) => tz.offset_from_utc_datetime(&naive).fix(),
            TargetZone::Fixed(offset) => *offset,
            TargetZone::Local => Local.offset_from_utc_datetime(&naive).fix(),
        }
    }

    /// Wall-clock view of `instant` in this zone.
    pub fn to_local(&self, instant: &DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset_at(instant))
    }

    /// Interpret a naive wall-clock value as local time in this zone.
    ///
    /// Ambiguous times (DST fold) take the earlier instant; times inside a
    /// DST gap do not exist and yield `None`.
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            TargetZone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
            TargetZone::Fixed(offset) => offset.from_local_datetime(naive).single(),
            TargetZone::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.fixed_offset()),
        }
    }
}

impl FromStr for TargetZone {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(TargetZone::Local);
        }
        if let Ok(tz) = trimmed.parse::<Tz>() {
            return Ok(TargetZone::Named(tz));
        }
        if trimmed.starts_with('+') || trimmed.starts_with('-') {
            if let Some(offset) = parse_fixed_offset(trimmed) {
                return Ok(TargetZone::Fixed(offset));
            }
        }
        Err(ZoneError(s.to_string()))
    }
}

impl fmt::Display for TargetZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetZone::Named(tz) => write!(f, "{}", tz.name()),
            TargetZone::Fixed(offset) => write!(f, "{}", offset),
            TargetZone::Local => f.write_str("Local"),
        }
    }
}
