use std::fs;

use anyhow::Context;
use chrono::{DateTime, Offset, Utc};
use tracing::{debug, info};

use super::{parse_exif_time, ResolvedTimestamp, TimeSource};
use crate::media::{MediaClass, MediaFile};
use crate::provider::{is_unset, MetadataProvider};
use crate::zone::TargetZone;

/// Composite sub-second + zoned tag first, then the plain capture tag.
pub const IMAGE_TAGS: &[&str] = &["Composite:SubSecDateTimeOriginal", "DateTimeOriginal"];
/// Creation-date variants; QuickTime stores these in UTC.
pub const VIDEO_TAGS: &[&str] = &["MediaCreateDate", "TrackCreateDate", "CreateDate"];

pub fn candidate_tags(class: MediaClass) -> &'static [&'static str] {
    match class {
        MediaClass::Image => IMAGE_TAGS,
        MediaClass::Video => VIDEO_TAGS,
    }
}

/// Zone a naive (offset-less) value of `class` is interpreted in.
fn naive_zone(class: MediaClass, target: &TargetZone) -> TargetZone {
    match class {
        MediaClass::Image => target.clone(),
        MediaClass::Video => TargetZone::Fixed(Utc.fix()),
    }
}

/// Determine the capture instant of `file`.
///
/// Candidate tags are probed in order and the first one that parses wins.
/// Without a provider, or when no tag parses, the file's modification time
/// is used. Only failing to stat the file is an error.
pub fn resolve(
    file: &MediaFile,
    target: &TargetZone,
    provider: Option<&dyn MetadataProvider>,
) -> anyhow::Result<ResolvedTimestamp> {
    if let Some(provider) = provider {
        let assumed = naive_zone(file.class, target);
        for &tag in candidate_tags(file.class) {
            let raw = match provider.read_tag(&file.path, tag) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(file = %file.path.display(), tag, "tag read failed: {}", e);
                    continue;
                }
            };
            if is_unset(&raw) {
                continue;
            }
            match parse_exif_time(&raw, &assumed) {
                Ok(t) => {
                    return Ok(ResolvedTimestamp {
                        instant: t.with_timezone(&Utc),
                        source: TimeSource::Tag(tag),
                    });
                }
                Err(e) => {
                    debug!(file = %file.path.display(), tag, "unusable tag value: {}", e);
                }
            }
        }
        info!(file = %file.path.display(), "No valid metadata tag found in file");
    }

    info!(file = %file.path.display(), "Falling back to file modification time (mtime)");
    let modified = fs::metadata(&file.path)
        .and_then(|m| m.modified())
        .with_context(|| format!("failed to stat {} for mtime", file.path.display()))?;
    Ok(ResolvedTimestamp {
        instant: DateTime::<Utc>::from(modified),
        source: TimeSource::Mtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JsonTagProvider;
    use chrono::{FixedOffset, TimeZone};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn plus8() -> TargetZone {
        TargetZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap())
    }

    fn media(dir: &std::path::Path, name: &str, class: MediaClass, body: &str) -> MediaFile {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        MediaFile::new(path, class)
    }

    #[test]
    fn test_naive_image_uses_target_zone() {
        let dir = tempdir().unwrap();
        let file = media(
            dir.path(),
            "a.jpg",
            MediaClass::Image,
            r#"{"DateTimeOriginal": "2023:08:15 14:30:05"}"#,
        );
        let provider = JsonTagProvider::new();
        let r = resolve(&file, &plus8(), Some(&provider)).unwrap();
        // the composite tag is derived from DateTimeOriginal alone
        assert_eq!(r.source, TimeSource::Tag("Composite:SubSecDateTimeOriginal"));
        assert!(r.is_authoritative());
        assert_eq!(r.instant, plus8_instant(2023, 8, 15, 14, 30, 5));
    }

    fn plus8_instant(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_naive_video_assumes_utc() {
        let dir = tempdir().unwrap();
        let file = media(
            dir.path(),
            "a.mov",
            MediaClass::Video,
            r#"{"CreateDate": "2023:08:15 14:30:05"}"#,
        );
        let provider = JsonTagProvider::new();
        let r = resolve(&file, &plus8(), Some(&provider)).unwrap();
        assert_eq!(r.source, TimeSource::Tag("CreateDate"));
        assert_eq!(r.instant, Utc.with_ymd_and_hms(2023, 8, 15, 14, 30, 5).unwrap());
    }

    #[test]
    fn test_priority_and_sentinel_skip() {
        let dir = tempdir().unwrap();
        let file = media(
            dir.path(),
            "a.mp4",
            MediaClass::Video,
            r#"{"MediaCreateDate": "0000:00:00 00:00:00", "TrackCreateDate": "2021:02:03 04:05:06", "CreateDate": "2019:01:01 00:00:00"}"#,
        );
        let provider = JsonTagProvider::new();
        let r = resolve(&file, &plus8(), Some(&provider)).unwrap();
        assert_eq!(r.source, TimeSource::Tag("TrackCreateDate"));
        assert_eq!(r.source.to_string(), "metadata (TrackCreateDate)");
    }

    #[test]
    fn test_read_error_and_garbage_continue_scan() {
        let dir = tempdir().unwrap();
        let file = media(
            dir.path(),
            "a.jpg",
            MediaClass::Image,
            r#"{"Composite:SubSecDateTimeOriginal": "garbage", "DateTimeOriginal": "2023:08:15 14:30:05.250-03:00"}"#,
        );
        let provider = JsonTagProvider::new();
        let r = resolve(&file, &plus8(), Some(&provider)).unwrap();
        assert_eq!(r.source, TimeSource::Tag("DateTimeOriginal"));
        assert_eq!(
            r.instant,
            Utc.with_ymd_and_hms(2023, 8, 15, 17, 30, 5).unwrap()
                + chrono::Duration::milliseconds(250)
        );

        let failing = JsonTagProvider::new().with_failing_tag("Composite:SubSecDateTimeOriginal");
        let file = media(
            dir.path(),
            "b.jpg",
            MediaClass::Image,
            r#"{"Composite:SubSecDateTimeOriginal": "2020:01:01 00:00:00", "DateTimeOriginal": "2023:08:15 14:30:05"}"#,
        );
        let r = resolve(&file, &plus8(), Some(&failing)).unwrap();
        assert_eq!(r.source, TimeSource::Tag("DateTimeOriginal"));
    }

    #[test]
    fn test_falls_back_to_mtime() {
        let dir = tempdir().unwrap();
        let file = media(dir.path(), "a.mkv", MediaClass::Video, "{}");
        let mtime = filetime::FileTime::from_unix_time(1_672_531_200, 0);
        filetime::set_file_mtime(&file.path, mtime).unwrap();

        let provider = JsonTagProvider::new();
        let r = resolve(&file, &plus8(), Some(&provider)).unwrap();
        assert_eq!(r.source, TimeSource::Mtime);
        assert!(!r.is_authoritative());
        assert_eq!(r.instant, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());

        // no provider at all goes straight to mtime
        let r = resolve(&file, &plus8(), None).unwrap();
        assert_eq!(r.source, TimeSource::Mtime);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let file = MediaFile::new(PathBuf::from("/definitely/not/here.jpg"), MediaClass::Image);
        assert!(resolve(&file, &plus8(), None).is_err());
    }
}
