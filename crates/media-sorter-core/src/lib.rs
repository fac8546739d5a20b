pub mod backup;
pub mod cancel;
pub mod config;
pub mod date;
pub mod enrich;
pub mod media;
pub mod mutate;
pub mod provider;
pub mod rename;
pub mod walk;
pub mod zone;

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::date::TimeSource;
use crate::media::MediaFile;
use crate::provider::{MetadataProvider, WriteOutcome};

pub use cancel::{CancellationToken, CancelledError};

/// What to walk.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub root: PathBuf,
    /// `None` = unlimited, `Some(0)` = root only
    pub max_depth: Option<usize>,
    /// Directories never entered (e.g. the backup directory)
    pub exclude: Vec<PathBuf>,
}

/// Control options for process execution.
#[derive(Debug, Clone, Default)]
pub struct ProcessControl {
    pub cancel_token: Option<CancellationToken>,
}

impl ProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Pipeline step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Resolve,
    Rename,
    Enrich,
    Sync,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Resolve => "resolve",
            Step::Rename => "rename",
            Step::Enrich => "enrich",
            Step::Sync => "sync",
        })
    }
}

/// A failure that stopped processing of one file.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed for {}: {cause:#}", .path.display())]
pub struct FileError {
    pub path: PathBuf,
    pub step: Step,
    pub cause: anyhow::Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichStatus {
    /// No metadata tool available
    Skipped,
    /// Every field already filled; no write issued
    UpToDate,
    Applied,
    AppliedWithWarnings,
    Failed(String),
}

/// Outcome of one file's pipeline.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub original: PathBuf,
    pub final_path: PathBuf,
    pub source: TimeSource,
    pub renamed: bool,
    pub enrich: EnrichStatus,
    pub sync_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    pub total_media: u64,
    pub renamed: u64,
    pub unchanged: u64,
    pub enriched: u64,
    pub failed: u64,
    /// One line per non-fatal failure
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

/// Called after every file with its 1-based position and its report.
pub type ProgressCallback = dyn Fn(u64, &FileReport) + Send + Sync;

fn occupied(dir: &Path, basename: &str) -> bool {
    dir.join(basename).symlink_metadata().is_ok()
}

/// Resolve, normalize, rename, enrich and sync one file, in that order.
///
/// Resolution and rename failures stop the file and are returned. Enrich
/// and sync failures are logged and recorded in the report.
pub fn process_file<R: Rng>(
    file: &MediaFile,
    settings: &Settings,
    provider: Option<&dyn MetadataProvider>,
    rng: &mut R,
) -> Result<FileReport, FileError> {
    let resolved = date::resolve(file, &settings.target_zone, provider).map_err(|cause| {
        FileError {
            path: file.path.clone(),
            step: Step::Resolve,
            cause,
        }
    })?;
    let time = date::normalize(&resolved.instant, &settings.target_zone);

    let authoritative = rename::filename_authority(
        resolved.is_authoritative(),
        time.millisecond,
        provider.is_some() && enrich::stores_subseconds(file.class),
    );
    let dir = file.path.parent().unwrap_or_else(|| Path::new(""));
    let plan = rename::plan(
        &time,
        settings.prefix_for(file.class),
        &file.extension,
        authoritative,
        &file.basename(),
        |name| occupied(dir, name),
        rng,
    );

    let final_path = if plan.is_noop() {
        info!(file = %file.path.display(), source = %resolved.source, "Filename is already canonical");
        file.path.clone()
    } else {
        let new_path = mutate::rename_file(&file.path, &plan).map_err(|e| FileError {
            path: file.path.clone(),
            step: Step::Rename,
            cause: anyhow::Error::new(e)
                .context(format!("could not rename to '{}'", plan.final_basename)),
        })?;
        if let Some(suffix) = plan.collision_suffix {
            warn!(
                file = %file.path.display(),
                "'{}' is taken, using suffix [{:03}]",
                plan.ideal_basename,
                suffix
            );
        }
        info!(
            file = %file.path.display(),
            source = %resolved.source,
            "Renamed to '{}'",
            plan.final_basename
        );
        new_path
    };

    let enrich = match provider {
        None => {
            debug!(file = %final_path.display(), "Skipping metadata enrichment (no metadata tool)");
            EnrichStatus::Skipped
        }
        Some(provider) => {
            let patch = enrich::prune(enrich::plan(&time, file.class), provider, &final_path);
            match mutate::write_patch(provider, &final_path, &patch) {
                Ok(None) => {
                    debug!(file = %final_path.display(), "Metadata already complete");
                    EnrichStatus::UpToDate
                }
                Ok(Some(WriteOutcome::Applied)) => {
                    info!(file = %final_path.display(), fields = patch.len(), "Metadata enriched");
                    EnrichStatus::Applied
                }
                Ok(Some(WriteOutcome::AppliedWithWarnings)) => {
                    info!(
                        file = %final_path.display(),
                        fields = patch.len(),
                        "Metadata enriched (with minor warnings from the metadata tool)"
                    );
                    EnrichStatus::AppliedWithWarnings
                }
                Err(e) => {
                    error!(file = %final_path.display(), step = %Step::Enrich, "Failed to enrich metadata: {}", e);
                    EnrichStatus::Failed(e.to_string())
                }
            }
        }
    };

    let sync_error = match mutate::sync_timestamp(&final_path, &resolved.instant) {
        Ok(()) => {
            debug!(file = %final_path.display(), "File timestamp synced");
            None
        }
        Err(e) => {
            error!(file = %final_path.display(), step = %Step::Sync, "Failed to sync file timestamp: {}", e);
            Some(e.to_string())
        }
    };

    Ok(FileReport {
        original: file.path.clone(),
        renamed: !plan.is_noop(),
        final_path,
        source: resolved.source,
        enrich,
        sync_error,
    })
}

/// Walk `options.root` and process every supported file, one at a time.
///
/// Per-file failures are logged and counted; an enumeration failure aborts
/// the whole run. A cancellation request stops the run between files.
pub fn process<R: Rng>(
    options: &ProcessOptions,
    settings: &Settings,
    provider: Option<&dyn MetadataProvider>,
    rng: &mut R,
    control: &ProcessControl,
    progress: &ProgressCallback,
) -> anyhow::Result<ProcessResult> {
    let mut result = ProcessResult::default();

    for entry in walk::media_files(&options.root, options.max_depth, settings, &options.exclude) {
        if let Some(ref token) = control.cancel_token {
            if token.check().is_err() {
                info!("Cancellation requested, stopping before the next file");
                result.cancelled = true;
                break;
            }
        }

        let file = entry?;
        result.total_media += 1;

        match process_file(&file, settings, provider, rng) {
            Ok(report) => {
                if report.renamed {
                    result.renamed += 1;
                } else {
                    result.unchanged += 1;
                }
                match &report.enrich {
                    EnrichStatus::Applied | EnrichStatus::AppliedWithWarnings => {
                        result.enriched += 1
                    }
                    EnrichStatus::Failed(msg) => result.warnings.push(format!(
                        "{}: {} failed: {}",
                        report.final_path.display(),
                        Step::Enrich,
                        msg
                    )),
                    EnrichStatus::Skipped | EnrichStatus::UpToDate => {}
                }
                if let Some(msg) = &report.sync_error {
                    result.warnings.push(format!(
                        "{}: {} failed: {}",
                        report.final_path.display(),
                        Step::Sync,
                        msg
                    ));
                }
                progress(result.total_media, &report);
            }
            Err(e) => {
                error!(file = %e.path.display(), step = %e.step, "{:#}", e.cause);
                result.failed += 1;
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::media::MediaClass;
    use crate::provider::JsonTagProvider;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::fs;
    use tempfile::tempdir;

    fn settings() -> Settings {
        Settings::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_image_with_subsecond_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("DSC0001.jpg");
        fs::write(
            &path,
            br#"{"Composite:SubSecDateTimeOriginal": "2023:08:15 14:30:05.750+08:00"}"#,
        )
        .unwrap();
        let provider = JsonTagProvider::new();
        let mut rng = StdRng::seed_from_u64(1);

        let file = MediaFile::new(path, MediaClass::Image);
        let report = process_file(&file, &settings(), Some(&provider), &mut rng).unwrap();

        assert!(report.renamed);
        assert_eq!(report.final_path, dir.path().join("IMG_20230815_143005_750.jpg"));
        assert_eq!(report.enrich, EnrichStatus::Applied);
        assert_eq!(report.sync_error, None);

        let tags = JsonTagProvider::tags(&report.final_path).unwrap();
        assert_eq!(tags["DateTimeOriginal"], "2023:08:15 14:30:05");
        assert_eq!(tags["OffsetTimeOriginal"], "+08:00");
        assert_eq!(tags["SubSecTimeOriginal"], "750");
    }

    #[test]
    fn test_mtime_file_without_tool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("movie.mkv");
        fs::write(&path, b"not metadata").unwrap();
        // 2023-01-01T00:00:00+08:00
        let mtime = filetime::FileTime::from_unix_time(1_672_502_400, 0);
        filetime::set_file_mtime(&path, mtime).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let file = MediaFile::new(path, MediaClass::Video);
        let report = process_file(&file, &settings(), None, &mut rng).unwrap();
        assert_eq!(report.source, TimeSource::Mtime);
        assert_eq!(report.final_path, dir.path().join("VID_20230101_000000.mkv"));
        assert_eq!(report.enrich, EnrichStatus::Skipped);
    }

    #[test]
    fn test_mtime_with_millis_promoted_when_tool_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shot.png");
        fs::write(&path, b"{}").unwrap();
        let mtime = filetime::FileTime::from_unix_time(1_672_502_400, 250_000_000);
        filetime::set_file_mtime(&path, mtime).unwrap();
        let provider = JsonTagProvider::new();
        let mut rng = StdRng::seed_from_u64(1);

        let file = MediaFile::new(path, MediaClass::Image);
        let report = process_file(&file, &settings(), Some(&provider), &mut rng).unwrap();
        // source label is untouched by promotion
        assert_eq!(report.source, TimeSource::Mtime);
        assert_eq!(report.final_path, dir.path().join("IMG_20230101_000000_250.png"));
    }

    #[test]
    fn test_enrich_failure_does_not_block_sync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        fs::write(&path, br#"{"CreateDate": "2023:08:15 06:30:05"}"#).unwrap();
        let provider = JsonTagProvider::new().with_failing_writes();
        let mut rng = StdRng::seed_from_u64(1);

        let file = MediaFile::new(path, MediaClass::Video);
        let report = process_file(&file, &settings(), Some(&provider), &mut rng).unwrap();
        assert!(matches!(report.enrich, EnrichStatus::Failed(_)));
        assert_eq!(report.sync_error, None);

        let meta = fs::metadata(&report.final_path).unwrap();
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        // 2023-08-15T06:30:05Z
        assert_eq!(mtime.unix_seconds(), 1_692_081_005);
    }

    /// The suffix `plan` will draw first from `StdRng::seed_from_u64(seed)`.
    fn first_suffix(seed: u64) -> u16 {
        StdRng::seed_from_u64(seed).random_range(0..1000)
    }

    #[test]
    fn test_rename_failure_stops_the_file() {
        let dir = tempdir().unwrap();
        let tags = br#"{"CreateDate": "2023:08:15 06:30:05"}"#;
        let path = dir.path().join("clip.mkv");
        fs::write(&path, tags).unwrap();
        let old_mtime = filetime::FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&path, old_mtime).unwrap();
        fs::write(dir.path().join("VID_20230815_143005.mkv"), b"first").unwrap();
        fs::write(
            dir.path()
                .join(format!("VID_20230815_143005_[{:03}].mkv", first_suffix(9))),
            b"second",
        )
        .unwrap();

        let provider = JsonTagProvider::new();
        let mut rng = StdRng::seed_from_u64(9);
        let file = MediaFile::new(path.clone(), MediaClass::Video);
        let err = process_file(&file, &settings(), Some(&provider), &mut rng).unwrap_err();
        assert_eq!(err.step, Step::Rename);
        assert!(err.to_string().contains("already exists"), "{}", err);

        // neither enriched nor synced
        assert_eq!(provider.write_calls(), 0);
        assert_eq!(fs::read(&path).unwrap(), tags);
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&meta), old_mtime);
    }

    #[test]
    fn test_process_counts_rename_failure_and_continues() {
        let dir = tempdir().unwrap();
        let tags = br#"{"CreateDate": "2023:08:15 06:30:05"}"#;
        fs::write(dir.path().join("VID_20230815_143005.mkv"), tags).unwrap();
        fs::write(
            dir.path()
                .join(format!("VID_20230815_143005_[{:03}].mkv", first_suffix(11))),
            tags,
        )
        .unwrap();
        fs::write(dir.path().join("clip.mkv"), tags).unwrap();
        fs::write(dir.path().join("z.jpg"), br#"{"DateTimeOriginal": "2023:08:15 14:30:05"}"#)
            .unwrap();

        let options = ProcessOptions {
            root: dir.path().to_path_buf(),
            max_depth: None,
            exclude: vec![],
        };
        let provider = JsonTagProvider::new();
        let mut rng = StdRng::seed_from_u64(11);
        let result = process(
            &options,
            &settings(),
            Some(&provider),
            &mut rng,
            &ProcessControl::new(),
            &|_, _| {},
        )
        .unwrap();

        // both occupants already carry their names and draw no suffix,
        // so clip.mkv gets the first draw and finds it taken
        assert_eq!(result.total_media, 4);
        assert_eq!(result.failed, 1);
        assert_eq!(result.unchanged, 2);
        assert_eq!(result.renamed, 1);
        assert!(dir.path().join("clip.mkv").exists());
        assert!(dir.path().join("IMG_20230815_143005.jpg").exists());
    }

    #[test]
    fn test_process_counts_and_cancellation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), br#"{"DateTimeOriginal": "2023:08:15 14:30:05"}"#)
            .unwrap();
        fs::write(dir.path().join("b.mov"), br#"{"CreateDate": "2023:08:15 06:30:05"}"#).unwrap();
        fs::write(dir.path().join("c.txt"), b"ignored").unwrap();

        let options = ProcessOptions {
            root: dir.path().to_path_buf(),
            max_depth: None,
            exclude: vec![],
        };
        let provider = JsonTagProvider::new();
        let mut rng = StdRng::seed_from_u64(3);

        let token = CancellationToken::new();
        token.cancel();
        let cancelled = process(
            &options,
            &settings(),
            Some(&provider),
            &mut rng,
            &ProcessControl::new().with_cancel_token(token),
            &|_, _| {},
        )
        .unwrap();
        assert!(cancelled.cancelled);
        assert_eq!(cancelled.total_media, 0);

        let result = process(
            &options,
            &settings(),
            Some(&provider),
            &mut rng,
            &ProcessControl::new(),
            &|_, _| {},
        )
        .unwrap();
        assert_eq!(result.total_media, 2);
        assert_eq!(result.renamed, 2);
        assert_eq!(result.enriched, 2);
        assert_eq!(result.failed, 0);
        assert!(dir.path().join("IMG_20230815_143005.jpg").exists());
        assert!(dir.path().join("VID_20230815_143005.mov").exists());
        assert!(dir.path().join("c.txt").exists());
    }
}
