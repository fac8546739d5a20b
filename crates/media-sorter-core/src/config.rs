use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::media::{extension_of, MediaClass, MediaFile};
use crate::zone::TargetZone;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "config.json";

fn default_image_prefix() -> String {
    "IMG".to_string()
}

fn default_video_prefix() -> String {
    "VID".to_string()
}

fn default_target_timezone() -> String {
    "+08:00".to_string()
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "heic", "webp", "gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_video_extensions() -> Vec<String> {
    ["mp4", "mov", "avi", "mkv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// On-disk configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    #[serde(default = "default_video_prefix")]
    pub video_prefix: String,
    #[serde(default = "default_target_timezone")]
    pub target_timezone: String,
    #[serde(default = "default_image_extensions")]
    pub supported_image_extensions: Vec<String>,
    #[serde(default = "default_video_extensions")]
    pub supported_video_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_prefix: default_image_prefix(),
            video_prefix: default_video_prefix(),
            target_timezone: default_target_timezone(),
            supported_image_extensions: default_image_extensions(),
            supported_video_extensions: default_video_extensions(),
        }
    }
}

impl Config {
    /// Load config from `path`, falling back to defaults when the file is
    /// missing or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let abs_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => {
                info!("{} not found, using default settings", abs_path.display());
                return Self::default();
            }
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(config) => {
                info!("Loaded settings from {}", abs_path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Could not parse {} ({}), using default settings",
                    abs_path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

/// Immutable, resolved settings threaded through every pipeline step.
#[derive(Debug, Clone)]
pub struct Settings {
    pub image_prefix: String,
    pub video_prefix: String,
    /// Lowercased, without leading dot, in configured order
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub target_zone: TargetZone,
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(exts.len());
    for ext in exts {
        let e = ext.trim().trim_start_matches('.').to_lowercase();
        if !e.is_empty() && !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

impl Settings {
    /// Resolve a config document. An unusable timezone is fatal.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let target_zone: TargetZone = config
            .target_timezone
            .parse()
            .with_context(|| "invalid 'target_timezone' in config")?;
        Ok(Self {
            image_prefix: config.image_prefix.clone(),
            video_prefix: config.video_prefix.clone(),
            image_extensions: normalize_extensions(&config.supported_image_extensions),
            video_extensions: normalize_extensions(&config.supported_video_extensions),
            target_zone,
        })
    }

    /// Decide the media class from the extension, case-insensitively.
    /// Image wins when an extension is configured for both classes.
    pub fn classify(&self, path: &Path) -> Option<MediaClass> {
        let ext = extension_of(path)?.to_lowercase();
        if self.image_extensions.contains(&ext) {
            Some(MediaClass::Image)
        } else if self.video_extensions.contains(&ext) {
            Some(MediaClass::Video)
        } else {
            None
        }
    }

    /// Build a `MediaFile` if `path` has a supported extension.
    pub fn media_file(&self, path: PathBuf) -> Option<MediaFile> {
        let class = self.classify(&path)?;
        Some(MediaFile::new(path, class))
    }

    pub fn prefix_for(&self, class: MediaClass) -> &str {
        match class {
            MediaClass::Image => &self.image_prefix,
            MediaClass::Video => &self.video_prefix,
        }
    }
}
