pub mod normalize;
pub mod parse;
pub mod resolve;

use std::fmt;

use chrono::{DateTime, Utc};

pub use normalize::{normalize, NormalizedTime};
pub use parse::{parse_exif_time, TimeParseError};
pub use resolve::{candidate_tags, resolve};

/// Where a resolved instant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Embedded metadata tag, by name
    Tag(&'static str),
    /// Filesystem modification time
    Mtime,
}

impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSource::Tag(tag) => write!(f, "metadata ({})", tag),
            TimeSource::Mtime => f.write_str("mtime"),
        }
    }
}

/// Result of timestamp resolution: absolute instant + where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimestamp {
    pub instant: DateTime<Utc>,
    pub source: TimeSource,
}

impl ResolvedTimestamp {
    /// Only metadata tags are authoritative; mtime never is.
    pub fn is_authoritative(&self) -> bool {
        matches!(self.source, TimeSource::Tag(_))
    }
}
