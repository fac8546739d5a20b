use chrono::{DateTime, FixedOffset, NaiveDateTime, SubsecRound, Timelike, Utc};

use crate::zone::TargetZone;

/// Wall-clock view of an instant in the target zone.
///
/// Sub-second precision is carried only as `millisecond`; `local` is
/// truncated to whole seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTime {
    /// The absolute instant this view was derived from
    pub instant: DateTime<Utc>,
    pub local: NaiveDateTime,
    /// Rounded half-up from nanoseconds, clamped to 999
    pub millisecond: u16,
    pub offset: FixedOffset,
    /// Display name of the target zone
    pub zone: String,
}

/// Round nanoseconds to the nearest millisecond. A result of 1000 is
/// clamped to 999 instead of carrying into the seconds field.
pub fn round_millis(nanos: u32) -> u16 {
    let ms = (u64::from(nanos) + 500_000) / 1_000_000;
    ms.min(999) as u16
}

pub fn normalize(instant: &DateTime<Utc>, zone: &TargetZone) -> NormalizedTime {
    let zoned = zone.to_local(instant);
    NormalizedTime {
        instant: *instant,
        local: zoned.naive_local().trunc_subsecs(0),
        millisecond: round_millis(zoned.nanosecond()),
        offset: *zoned.offset(),
        zone: zone.to_string(),
    }
}

impl NormalizedTime {
    /// `YYYY:MM:DD HH:MM:SS` in the target zone.
    pub fn wall_clock(&self) -> String {
        self.local.format("%Y:%m:%d %H:%M:%S").to_string()
    }

    /// `YYYY:MM:DD HH:MM:SS` in UTC.
    pub fn utc_wall_clock(&self) -> String {
        self.instant
            .naive_utc()
            .trunc_subsecs(0)
            .format("%Y:%m:%d %H:%M:%S")
            .to_string()
    }

    /// `+HH:MM` / `-HH:MM`
    pub fn offset_string(&self) -> String {
        self.offset.to_string()
    }

    /// Three-digit millisecond text for sub-second fields.
    pub fn subsec(&self) -> String {
        format!("{:03}", self.millisecond)
    }

    /// `YYYYMMDD_HHMMSS` for file names.
    pub fn filename_stamp(&self) -> String {
        self.local.format("%Y%m%d_%H%M%S").to_string()
    }
}
