use std::path::{Path, PathBuf};

use anyhow::Context;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::media::MediaFile;

/// Lazily enumerate supported media files under `root`.
///
/// `max_depth`: `None` descends without limit, `Some(0)` stays in `root`,
/// `Some(n)` enters at most `n` levels of subdirectories. Directories in
/// `exclude` are not entered. Entries are sorted by name, which also makes
/// walkdir read each directory completely before yielding from it, so files
/// renamed while the walk is in progress are not visited twice.
pub fn media_files<'a>(
    root: &Path,
    max_depth: Option<usize>,
    settings: &'a Settings,
    exclude: &'a [PathBuf],
) -> impl Iterator<Item = anyhow::Result<MediaFile>> + 'a {
    let mut walker = WalkDir::new(root).sort_by_file_name();
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth + 1);
    }

    walker
        .into_iter()
        .filter_entry(move |entry| {
            !(entry.file_type().is_dir() && exclude.iter().any(|ex| same_path(entry.path(), ex)))
        })
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                settings.media_file(entry.into_path()).map(Ok)
            }
            Ok(_) => None,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                Some(Err::<MediaFile, _>(e).with_context(|| format!("error accessing path {:?}", path)))
            }
        })
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
