//! Canonical file names: `PREFIX_YYYYMMDD_HHMMSS[_MMM][_[RRR]].ext`

use rand::Rng;

use crate::date::NormalizedTime;

/// Proposed rename for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub current_basename: String,
    /// Pure function of time, prefix, extension and authority
    pub ideal_basename: String,
    /// What the file will actually be called
    pub final_basename: String,
    /// Present only when the ideal name was already taken
    pub collision_suffix: Option<u16>,
}

impl RenamePlan {
    /// The file already carries its canonical name.
    pub fn is_noop(&self) -> bool {
        self.final_basename == self.current_basename
    }
}

/// Whether the filename may carry milliseconds.
///
/// An mtime-derived time is promoted when it has a nonzero millisecond
/// part and enrichment will store that millisecond in the file, so the
/// next run reads the same value back from metadata. `subsec_persisted`
/// is false without a metadata tool, and for classes whose enrichment
/// keeps whole seconds only.
pub fn filename_authority(is_authoritative: bool, millisecond: u16, subsec_persisted: bool) -> bool {
    is_authoritative || (subsec_persisted && millisecond > 0)
}

fn with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

fn canonical_stem(time: &NormalizedTime, prefix: &str, authoritative: bool) -> String {
    let stamp = time.filename_stamp();
    if authoritative && time.millisecond > 0 {
        format!("{}_{}_{:03}", prefix, stamp, time.millisecond)
    } else {
        format!("{}_{}", prefix, stamp)
    }
}

/// Suffix of a name that is already `{stem}_[NNN].ext`.
fn existing_suffix(current: &str, stem: &str, extension: &str) -> Option<u16> {
    let rest = current.strip_prefix(stem)?.strip_prefix("_[")?;
    let digits = if extension.is_empty() {
        rest.strip_suffix(']')?
    } else {
        rest.strip_suffix(extension)?.strip_suffix('.')?.strip_suffix(']')?
    };
    if digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// `PREFIX_YYYYMMDD_HHMMSS[_MMM].ext`. Milliseconds appear only for
/// authoritative times with a nonzero rounded millisecond.
pub fn canonical_basename(
    time: &NormalizedTime,
    prefix: &str,
    extension: &str,
    authoritative: bool,
) -> String {
    with_extension(&canonical_stem(time, prefix, authoritative), extension)
}

/// Plan the rename of a file currently called `current_basename`.
///
/// `occupied` reports whether a basename already exists next to the file.
/// A taken ideal name gets one random bracketed suffix; the suffixed name
/// is not re-checked. A file that already carries a suffixed form of the
/// ideal name keeps it while the ideal name stays taken.
pub fn plan<R: Rng>(
    time: &NormalizedTime,
    prefix: &str,
    extension: &str,
    authoritative: bool,
    current_basename: &str,
    occupied: impl Fn(&str) -> bool,
    rng: &mut R,
) -> RenamePlan {
    let stem = canonical_stem(time, prefix, authoritative);
    let ideal = with_extension(&stem, extension);

    if ideal == current_basename || !occupied(&ideal) {
        return RenamePlan {
            current_basename: current_basename.to_string(),
            final_basename: ideal.clone(),
            ideal_basename: ideal,
            collision_suffix: None,
        };
    }

    if let Some(suffix) = existing_suffix(current_basename, &stem, extension) {
        return RenamePlan {
            current_basename: current_basename.to_string(),
            ideal_basename: ideal,
            final_basename: current_basename.to_string(),
            collision_suffix: Some(suffix),
        };
    }

    let suffix: u16 = rng.random_range(0..1000);
    RenamePlan {
        current_basename: current_basename.to_string(),
        ideal_basename: ideal,
        final_basename: with_extension(&format!("{}_[{:03}]", stem, suffix), extension),
        collision_suffix: Some(suffix),
    }
}
