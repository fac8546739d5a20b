use std::fmt;
use std::path::{Path, PathBuf};

/// Which tag lists, prefix, and enrichment rules apply to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    Image,
    Video,
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaClass::Image => f.write_str("image"),
            MediaClass::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Current location on disk
    pub path: PathBuf,
    /// Extension exactly as it appears in the file name (no leading dot)
    pub extension: String,
    /// Decided once from the lowercased extension
    pub class: MediaClass,
}

impl MediaFile {
    pub fn new(path: PathBuf, class: MediaClass) -> Self {
        let extension = extension_of(&path).unwrap_or_default().to_string();
        Self {
            path,
            extension,
            class,
        }
    }

    /// File name component, lossily decoded.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Extension without the leading dot, as written on disk.
pub fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_keeps_case() {
        let m = MediaFile::new(PathBuf::from("/photos/DSC0001.JPG"), MediaClass::Image);
        assert_eq!(m.extension, "JPG");
        assert_eq!(m.basename(), "DSC0001.JPG");
    }

    #[test]
    fn test_no_extension() {
        let m = MediaFile::new(PathBuf::from("/photos/README"), MediaClass::Image);
        assert_eq!(m.extension, "");
    }
}
