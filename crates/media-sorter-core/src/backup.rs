use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive `source_dir` into `backup_dir/backup_<name>_<YYYYMMDD_HHMMSS>.zip`.
///
/// Entries keep their path relative to `source_dir`. The backup directory
/// itself is skipped when it lives inside the source tree.
pub fn create_backup(source_dir: &Path, backup_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(backup_dir)
        .with_context(|| format!("could not create backup directory {}", backup_dir.display()))?;

    let dir_name = source_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("media");
    let archive_name = format!(
        "backup_{}_{}.zip",
        dir_name,
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let archive_path = backup_dir.join(archive_name);
    info!("Backing up '{}' to '{}'", source_dir.display(), archive_path.display());

    let abs_backup_dir = backup_dir
        .canonicalize()
        .with_context(|| format!("could not resolve {}", backup_dir.display()))?;

    let file = File::create(&archive_path)
        .with_context(|| format!("could not create backup file {}", archive_path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.path().canonicalize().map_or(false, |p| p == abs_backup_dir))
        });

    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(source_dir)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        // zip entry names always use forward slashes
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut src = File::open(entry.path())
                .with_context(|| format!("could not read {}", entry.path().display()))?;
            io::copy(&mut src, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_backup_skips_its_own_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("trip")).unwrap();
        fs::write(root.join("a.jpg"), b"aaa").unwrap();
        fs::write(root.join("trip/b.mov"), b"bbb").unwrap();
        let backups = root.join("media_backups");

        let archive_path = create_backup(&root, &backups).unwrap();
        assert!(archive_path.starts_with(&backups));
        let name = archive_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("backup_photos_") && name.ends_with(".zip"));

        let mut archive = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(|s| s.to_string()).collect();
        assert!(names.contains(&"a.jpg".to_string()));
        assert!(names.contains(&"trip/b.mov".to_string()));
        assert!(names.iter().all(|n| !n.starts_with("media_backups")));

        let mut body = String::new();
        archive
            .by_name("trip/b.mov")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "bbb");
    }
}
