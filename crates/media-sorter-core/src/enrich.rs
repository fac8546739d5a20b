//! Minimal, non-overwriting timestamp patches.
//!
//! Every write carries a guard that the metadata tool evaluates against the
//! live file, so a field that already holds a real value is never replaced.

use std::path::Path;

use tracing::debug;

use crate::date::NormalizedTime;
use crate::media::MediaClass;
use crate::provider::{is_unset, MetadataProvider, SENTINEL_DATE};

/// Image date fields, written as target-zone wall clock.
pub const IMAGE_DATE_FIELDS: [&str; 3] = ["DateTimeOriginal", "CreateDate", "ModifyDate"];
/// Offsets matching `IMAGE_DATE_FIELDS` position by position.
pub const IMAGE_OFFSET_FIELDS: [&str; 3] = ["OffsetTimeOriginal", "OffsetTimeDigitized", "OffsetTime"];
pub const IMAGE_SUBSEC_FIELDS: [&str; 3] = ["SubSecTimeOriginal", "SubSecTimeDigitized", "SubSecTime"];

/// QuickTime date fields, written as UTC wall clock.
pub const VIDEO_DATE_FIELDS: [&str; 6] = [
    "MediaCreateDate",
    "TrackCreateDate",
    "CreateDate",
    "MediaModifyDate",
    "TrackModifyDate",
    "ModifyDate",
];

pub const VIDEO_GROUP: &str = "QuickTime";

/// Condition under which a field may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Field absent, empty, or the zero date
    EmptyOrSentinel,
    /// Field absent or empty
    Empty,
}

impl Guard {
    /// Evaluate against the field's current raw text.
    pub fn holds(&self, current: &str) -> bool {
        match self {
            Guard::EmptyOrSentinel => is_unset(current),
            Guard::Empty => current.trim().is_empty(),
        }
    }

    /// Same condition as an exiftool `-if` expression.
    pub fn exiftool_condition(&self, tag: &str) -> String {
        match self {
            Guard::EmptyOrSentinel => {
                format!(r#"not ${tag} or ${tag} eq "{SENTINEL_DATE}""#)
            }
            Guard::Empty => format!("not ${tag}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    /// Unqualified tag name
    pub field: &'static str,
    pub guard: Guard,
    pub value: String,
}

impl FieldWrite {
    pub fn new(field: &'static str, guard: Guard, value: impl Into<String>) -> Self {
        Self {
            field,
            guard,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataPatch {
    pub class: MediaClass,
    /// Tag group prefix every field is qualified with, if any
    pub group: Option<&'static str>,
    pub writes: Vec<FieldWrite>,
}

impl MetadataPatch {
    /// Field name as the tool addresses it, e.g. `QuickTime:CreateDate`.
    pub fn qualified(&self, field: &str) -> String {
        match self.group {
            Some(group) => format!("{}:{}", group, field),
            None => field.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

/// Whether enrichment of `class` records the millisecond part.
pub fn stores_subseconds(class: MediaClass) -> bool {
    match class {
        MediaClass::Image => true,
        MediaClass::Video => false,
    }
}

/// Build the full guarded patch for a file of `class` at `time`.
pub fn plan(time: &NormalizedTime, class: MediaClass) -> MetadataPatch {
    match class {
        MediaClass::Image => plan_image(time),
        MediaClass::Video => plan_video(time),
    }
}

fn plan_image(time: &NormalizedTime) -> MetadataPatch {
    let wall_clock = time.wall_clock();
    let offset = time.offset_string();
    let mut writes = Vec::with_capacity(9);

    for field in IMAGE_DATE_FIELDS {
        writes.push(FieldWrite::new(field, Guard::EmptyOrSentinel, wall_clock.clone()));
    }
    for field in IMAGE_OFFSET_FIELDS {
        writes.push(FieldWrite::new(field, Guard::Empty, offset.clone()));
    }
    if time.millisecond > 0 {
        let subsec = time.subsec();
        for field in IMAGE_SUBSEC_FIELDS {
            writes.push(FieldWrite::new(field, Guard::Empty, subsec.clone()));
        }
    }

    MetadataPatch {
        class: MediaClass::Image,
        group: None,
        writes,
    }
}

fn plan_video(time: &NormalizedTime) -> MetadataPatch {
    let utc = time.utc_wall_clock();
    let writes = VIDEO_DATE_FIELDS
        .into_iter()
        .map(|field| FieldWrite::new(field, Guard::EmptyOrSentinel, utc.clone()))
        .collect();

    MetadataPatch {
        class: MediaClass::Video,
        group: Some(VIDEO_GROUP),
        writes,
    }
}

/// Drop writes whose guard is already false on the file right now.
///
/// A field that cannot be read stays in the patch; its guard still
/// protects it at write time.
pub fn prune(mut patch: MetadataPatch, provider: &dyn MetadataProvider, path: &Path) -> MetadataPatch {
    let kept: Vec<FieldWrite> = patch
        .writes
        .iter()
        .filter(|write| {
            let tag = patch.qualified(write.field);
            match provider.read_tag(path, &tag) {
                Ok(current) => write.guard.holds(&current),
                Err(e) => {
                    debug!(file = %path.display(), tag = %tag, "keeping field after read error: {}", e);
                    true
                }
            }
        })
        .cloned()
        .collect();
    patch.writes = kept;
    patch
}
