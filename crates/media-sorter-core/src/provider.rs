//! Tag read / guarded tag write capability backing resolution and enrichment.

use std::cell::Cell;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::enrich::MetadataPatch;

const COMPOSITE_GROUP: &str = "Composite:";
const SUB_SEC_DATE_TIME_ORIGINAL: &str = "Composite:SubSecDateTimeOriginal";

/// Value meaning "field present but no real date".
pub const SENTINEL_DATE: &str = "0000:00:00 00:00:00";

/// True for raw tag text that carries no date.
pub fn is_unset(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == SENTINEL_DATE
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("metadata tool not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to run {}: {source}", .tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("metadata tool exited with {status}: {output}")]
    Failed { status: String, output: String },
}

/// Outcome of a successful patch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The tool reported minor warnings (including unmet guards)
    AppliedWithWarnings,
}

/// Read and conditionally write metadata tags of one file.
pub trait MetadataProvider {
    /// Raw text of `tag`, trimmed. Empty when the tag is absent.
    fn read_tag(&self, path: &Path, tag: &str) -> Result<String, ProviderError>;

    /// Apply every write in `patch` whose guard holds on the file as it is
    /// at write time. One batched call per file.
    fn write_patch(&self, path: &Path, patch: &MetadataPatch)
        -> Result<WriteOutcome, ProviderError>;
}

/// `exiftool` driven as a subprocess.
#[derive(Debug, Clone)]
pub struct ExifTool {
    path: PathBuf,
}

impl ExifTool {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Use `override_path` if given (it must exist), otherwise search `PATH`.
    /// `Ok(None)` means the tool is simply not installed.
    pub fn locate(override_path: Option<&Path>) -> Result<Option<Self>, ProviderError> {
        if let Some(p) = override_path {
            if p.exists() {
                return Ok(Some(Self::new(p.to_path_buf())));
            }
            return Err(ProviderError::NotFound(p.to_path_buf()));
        }
        Ok(which::which("exiftool").ok().map(Self::new))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[String]) -> Result<std::process::Output, ProviderError> {
        Command::new(&self.path)
            .args(args)
            .output()
            .map_err(|source| ProviderError::Spawn {
                tool: self.path.clone(),
                source,
            })
    }
}

/// Build the exiftool argument list for a patch: one `-if`-guarded command
/// per field, separated by `-execute`, sharing the trailing common args.
pub fn exiftool_write_args(path: &Path, patch: &MetadataPatch) -> Vec<String> {
    let mut args = Vec::with_capacity(patch.writes.len() * 4 + 6);
    for (i, write) in patch.writes.iter().enumerate() {
        if i > 0 {
            args.push("-execute".to_string());
        }
        let tag = patch.qualified(write.field);
        args.push("-if".to_string());
        args.push(write.guard.exiftool_condition(&tag));
        args.push(format!("-{}={}", tag, write.value));
    }
    args.extend([
        "-common_args".to_string(),
        "-q".to_string(),
        "-m".to_string(),
        "-overwrite_original".to_string(),
        path.to_string_lossy().into_owned(),
    ]);
    args
}

impl MetadataProvider for ExifTool {
    fn read_tag(&self, path: &Path, tag: &str) -> Result<String, ProviderError> {
        let args = vec![
            "-q".to_string(),
            "-m".to_string(),
            "-p".to_string(),
            format!("${}", tag),
            path.to_string_lossy().into_owned(),
        ];
        let output = self.run(&args)?;
        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ProviderError::Failed {
                status: output.status.to_string(),
                output: text.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn write_patch(
        &self,
        path: &Path,
        patch: &MetadataPatch,
    ) -> Result<WriteOutcome, ProviderError> {
        let args = exiftool_write_args(path, patch);
        debug!(file = %path.display(), fields = patch.writes.len(), "exiftool write");
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(WriteOutcome::Applied),
            // 2 = minor errors/warnings or a failed -if condition
            Some(2) => Ok(WriteOutcome::AppliedWithWarnings),
            _ => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Err(ProviderError::Failed {
                    status: output.status.to_string(),
                    output: text.trim().to_string(),
                })
            }
        }
    }
}

/// Provider that keeps tags as a JSON object in the file body, for tests.
///
/// Tags travel with the file across renames and are stored by bare name,
/// so `QuickTime:CreateDate` and `CreateDate` address the same value.
/// `Composite:SubSecDateTimeOriginal` is derived on read unless stored
/// explicitly. Guards are evaluated against the body at write time.
#[derive(Debug, Default)]
pub struct JsonTagProvider {
    failing_tags: HashSet<String>,
    fail_writes: bool,
    writes: Cell<usize>,
}

impl JsonTagProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads of `tag` return an error.
    pub fn with_failing_tag(mut self, tag: &str) -> Self {
        self.failing_tags.insert(tag.to_string());
        self
    }

    /// Every write call fails hard.
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Number of `write_patch` calls issued so far.
    pub fn write_calls(&self) -> usize {
        self.writes.get()
    }

    /// Read the whole tag map of a file; a non-JSON body has no tags.
    pub fn tags(path: &Path) -> io::Result<Map<String, Value>> {
        let bytes = fs::read(path)?;
        Ok(match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        })
    }

    /// Body key a tag name is stored under. Group prefixes are dropped,
    /// except for composite tags, which only exist under their full name.
    fn storage_key(tag: &str) -> &str {
        if tag.starts_with(COMPOSITE_GROUP) {
            return tag;
        }
        tag.split_once(':').map_or(tag, |(_, name)| name)
    }

    fn text<'a>(tags: &'a Map<String, Value>, key: &str) -> &'a str {
        tags.get(key).and_then(|v| v.as_str()).unwrap_or("").trim()
    }

    /// `DateTimeOriginal[.SubSecTimeOriginal][OffsetTimeOriginal]`, the
    /// way exiftool composes it.
    fn sub_sec_date_time_original(tags: &Map<String, Value>) -> String {
        let base = Self::text(tags, "DateTimeOriginal");
        if is_unset(base) {
            return String::new();
        }
        let mut out = base.to_string();
        let subsec = Self::text(tags, "SubSecTimeOriginal");
        if !subsec.is_empty() {
            out.push('.');
            out.push_str(subsec);
        }
        out.push_str(Self::text(tags, "OffsetTimeOriginal"));
        out
    }

    fn io_failure(e: io::Error) -> ProviderError {
        ProviderError::Failed {
            status: "io".to_string(),
            output: e.to_string(),
        }
    }
}

impl MetadataProvider for JsonTagProvider {
    fn read_tag(&self, path: &Path, tag: &str) -> Result<String, ProviderError> {
        if self.failing_tags.contains(tag) {
            return Err(ProviderError::Failed {
                status: "1".to_string(),
                output: format!("cannot read {}", tag),
            });
        }
        let tags = Self::tags(path).map_err(Self::io_failure)?;
        let key = Self::storage_key(tag);
        if key == SUB_SEC_DATE_TIME_ORIGINAL && !tags.contains_key(key) {
            return Ok(Self::sub_sec_date_time_original(&tags));
        }
        Ok(Self::text(&tags, key).to_string())
    }

    fn write_patch(
        &self,
        path: &Path,
        patch: &MetadataPatch,
    ) -> Result<WriteOutcome, ProviderError> {
        self.writes.set(self.writes.get() + 1);
        if self.fail_writes {
            return Err(ProviderError::Failed {
                status: "1".to_string(),
                output: "write refused".to_string(),
            });
        }

        let mut tags = Self::tags(path).map_err(Self::io_failure)?;
        let mut skipped = 0usize;
        for write in &patch.writes {
            let tag = patch.qualified(write.field);
            let key = Self::storage_key(&tag);
            if write.guard.holds(Self::text(&tags, key)) {
                tags.insert(key.to_string(), Value::String(write.value.clone()));
            } else {
                skipped += 1;
            }
        }
        let body = serde_json::to_vec_pretty(&Value::Object(tags)).map_err(|e| {
            ProviderError::Failed {
                status: "io".to_string(),
                output: e.to_string(),
            }
        })?;
        fs::write(path, body).map_err(Self::io_failure)?;

        if skipped > 0 {
            Ok(WriteOutcome::AppliedWithWarnings)
        } else {
            Ok(WriteOutcome::Applied)
        }
    }
}
