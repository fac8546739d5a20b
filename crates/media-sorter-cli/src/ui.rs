use std::path::Path;

use dialoguer::console::Term;
use dialoguer::{Confirm, Input};

use media_sorter_core::config::Settings;

/// Phrase that must be typed to run without exiftool.
pub const CRITICAL_PHRASE: &str = "Please continue anyway!";

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

const EXIFTOOL_WARNING: &str = r"
######################################################################
#                                                                    #
#               !!! CRITICAL WARNING: 'exiftool' not found !!!       #
#                                                                    #
######################################################################

Metadata support is DISABLED for this run.

[ WILL NOT WORK ]
  - Reading media metadata (EXIF, QuickTime).
  - Writing/enriching media metadata.

[ WILL HAPPEN INSTEAD ]
  - The file modification time (mtime) is used for ALL files.

[ CONSEQUENCES ]
  - Files are RENAMED using possibly inaccurate modification times.
  - Millisecond precision is NOT used in new filenames.
  - The metadata INSIDE the files stays untouched.

[ RECOMMENDATION ]
  - Stop and install exiftool
    (e.g. 'sudo apt install libimage-exiftool-perl' or 'brew install exiftool').
";

pub fn show_exiftool_warning() {
    eprintln!("{}", EXIFTOOL_WARNING);
}

fn depth_line(max_depth: Option<usize>) -> String {
    match max_depth {
        None => "Fully recursive (all subdirectories).".to_string(),
        Some(0) => "Current directory only (non-recursive).".to_string(),
        Some(1) => "Limited to 1 level deep.".to_string(),
        Some(n) => format!("Limited to {} levels deep.", n),
    }
}

/// Describe what a run is about to do.
pub fn execution_plan(
    target: &Path,
    backup_dir: Option<&Path>,
    tool_found: bool,
    settings: &Settings,
    max_depth: Option<usize>,
) -> String {
    let mut lines = vec![
        RULE.to_string(),
        format!("{:^70}", "EXECUTION PLAN"),
        RULE.to_string(),
        String::new(),
        format!("  TARGET DIRECTORY: {}", target.display()),
        String::new(),
    ];

    match backup_dir {
        Some(dir) => lines.push(format!(
            "  BACKUP:           Enabled. A zip archive will be created in '{}'.",
            dir.display()
        )),
        None => lines.push(
            "  BACKUP:           Disabled. Files will be modified in place without a backup."
                .to_string(),
        ),
    }
    if !tool_found {
        lines.push("  WARNING:          Operating in LIMITED MODE ('exiftool' not found).".to_string());
    }
    lines.push(format!("  TRAVERSAL DEPTH:  {}", depth_line(max_depth)));
    lines.push(format!("  TARGET TIMEZONE:  {}", settings.target_zone));

    lines.push(String::new());
    lines.push("  PROCESSING:       Images & Videos".to_string());
    if !settings.image_extensions.is_empty() {
        lines.push(format!("  Image Types:      {}", settings.image_extensions.join(" ")));
    }
    if !settings.video_extensions.is_empty() {
        lines.push(format!("  Video Types:      {}", settings.video_extensions.join(" ")));
    }

    lines.extend(
        [
            "",
            THIN_RULE,
            "  WORKFLOW OVERVIEW:",
            THIN_RULE,
            "  1. [Read Time]:   The timestamp is taken from the file's metadata",
            "                    (EXIF/QuickTime), falling back to its modification time.",
            "",
            "  2. [Rename File]: Files are renamed after that time:",
            "                    - PREFIX_YYYYMMDD_HHMMSS.ext",
            "                    - PREFIX_YYYYMMDD_HHMMSS_ms.ext (with millisecond precision)",
            "",
            "  3. [Sync Info]:",
            "     - Empty metadata date fields are filled in.",
            "     - The file modification time is set to the same instant.",
            RULE,
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines.join("\n")
}

/// Ask whether to go ahead with the plan.
pub fn confirm_plan() -> anyhow::Result<bool> {
    Ok(Confirm::new()
        .with_prompt("Are you sure you want to proceed?")
        .default(false)
        .interact_on(&Term::stderr())?)
}

/// Require the exact critical phrase to run without exiftool.
pub fn confirm_limited_mode() -> anyhow::Result<bool> {
    let input: String = Input::new()
        .with_prompt(format!("To proceed in this limited mode, type '{}'", CRITICAL_PHRASE))
        .allow_empty(true)
        .interact_text_on(&Term::stderr())?;
    Ok(input.trim() == CRITICAL_PHRASE)
}

/// Ask whether to keep going after a non-fatal problem.
pub fn confirm_continue(message: &str) -> anyhow::Result<bool> {
    Ok(Confirm::new()
        .with_prompt(format!("{} Continue anyway?", message))
        .default(false)
        .interact_on(&Term::stderr())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_sorter_core::config::Config;

    #[test]
    fn test_execution_plan_lists_settings() {
        let settings = Settings::from_config(&Config::default()).unwrap();
        let plan = execution_plan(
            Path::new("/photos"),
            Some(Path::new("/photos/media_backups")),
            false,
            &settings,
            Some(2),
        );
        assert!(plan.contains("TARGET DIRECTORY: /photos"));
        assert!(plan.contains("'/photos/media_backups'"));
        assert!(plan.contains("LIMITED MODE"));
        assert!(plan.contains("Limited to 2 levels deep."));
        assert!(plan.contains("Image Types:      jpg jpeg png heic webp gif"));
        assert!(plan.contains("Video Types:      mp4 mov avi mkv"));
    }

    #[test]
    fn test_depth_line() {
        assert_eq!(depth_line(None), "Fully recursive (all subdirectories).");
        assert_eq!(depth_line(Some(0)), "Current directory only (non-recursive).");
        assert_eq!(depth_line(Some(1)), "Limited to 1 level deep.");
    }
}
