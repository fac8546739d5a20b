use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;

use crate::enrich::MetadataPatch;
use crate::provider::{MetadataProvider, ProviderError, WriteOutcome};
use crate::rename::RenamePlan;

/// Move `path` to the planned name in the same directory.
///
/// Returns the path the file now lives at. Never replaces an existing file:
/// if the final name is taken (e.g. the collision suffix collided too) the
/// rename is refused.
pub fn rename_file(path: &Path, plan: &RenamePlan) -> io::Result<PathBuf> {
    if plan.is_noop() {
        return Ok(path.to_path_buf());
    }
    let target = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&plan.final_basename);
    if target.symlink_metadata().is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        ));
    }
    fs::rename(path, &target)?;
    Ok(target)
}

/// Issue the patch in one provider call. An empty patch issues nothing.
pub fn write_patch(
    provider: &dyn MetadataProvider,
    path: &Path,
    patch: &MetadataPatch,
) -> Result<Option<WriteOutcome>, ProviderError> {
    if patch.is_empty() {
        return Ok(None);
    }
    provider.write_patch(path, patch).map(Some)
}

/// Set both access and modification time to `instant`.
pub fn sync_timestamp(path: &Path, instant: &DateTime<Utc>) -> io::Result<()> {
    let ft = FileTime::from_unix_time(instant.timestamp(), instant.timestamp_subsec_nanos());
    filetime::set_file_times(path, ft, ft)
}
