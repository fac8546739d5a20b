mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use media_sorter_core::backup::create_backup;
use media_sorter_core::config::{Config, Settings, CONFIG_FILENAME};
use media_sorter_core::provider::{ExifTool, MetadataProvider};
use media_sorter_core::{CancellationToken, ProcessControl, ProcessOptions};

#[derive(Parser)]
#[command(
    name = "media-sorter",
    version,
    about = "Rename photos and videos after their capture time and fill in missing date metadata"
)]
struct Cli {
    /// Directory to process (same as --dir)
    directory: Option<PathBuf>,

    /// Directory to process
    #[arg(long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Skip the interactive confirmation
    #[arg(short, long)]
    yes: bool,

    /// Do not create a backup archive before processing
    #[arg(long)]
    no_backup: bool,

    /// Where backup archives are stored
    #[arg(long, default_value = "./media_backups")]
    backup_dir: PathBuf,

    /// Full path to the exiftool executable (default: search PATH)
    #[arg(long)]
    exiftool_path: Option<PathBuf>,

    /// Maximum traversal depth: -1 = unlimited, 0 = target directory only
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    depth: i64,

    /// Config file
    #[arg(long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn max_depth(depth: i64) -> anyhow::Result<Option<usize>> {
    match depth {
        -1 => Ok(None),
        d if d >= 0 => Ok(Some(d as usize)),
        d => bail!("invalid --depth {}: use -1 for unlimited or a value >= 0", d),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let t_total = std::time::Instant::now();

    let target = match cli.dir.or(cli.directory) {
        Some(dir) => dir,
        None => bail!("no target directory given (use --dir DIR or pass it as the first argument)"),
    };
    let max_depth = max_depth(cli.depth)?;

    let config = Config::load(&cli.config);
    let settings = Settings::from_config(&config)?;

    let exiftool = match ExifTool::locate(cli.exiftool_path.as_deref()) {
        Ok(found) => found,
        Err(e) => {
            warn!("{}", e);
            None
        }
    };
    match &exiftool {
        Some(tool) => info!("Using exiftool at {}", tool.path().display()),
        None => {
            ui::show_exiftool_warning();
            if !ui::confirm_limited_mode()? {
                eprintln!("Aborted.");
                return Ok(());
            }
        }
    }

    let target = std::path::absolute(&target)
        .with_context(|| format!("could not resolve {}", target.display()))?;
    if !target.is_dir() {
        bail!("'{}' is not a directory", target.display());
    }
    let backup_dir = std::path::absolute(&cli.backup_dir)
        .with_context(|| format!("could not resolve {}", cli.backup_dir.display()))?;

    let backup_target = (!cli.no_backup).then_some(backup_dir.as_path());
    eprintln!(
        "{}",
        ui::execution_plan(&target, backup_target, exiftool.is_some(), &settings, max_depth)
    );
    if !cli.yes && !ui::confirm_plan()? {
        eprintln!("Aborted.");
        return Ok(());
    }

    if let Some(dir) = backup_target {
        match create_backup(&target, dir) {
            Ok(archive) => info!("Backup written to {}", archive.display()),
            Err(e) => {
                error!("Backup failed: {:#}", e);
                if cli.yes {
                    bail!("backup failed, not touching any file");
                }
                if !ui::confirm_continue("Backup failed.")? {
                    eprintln!("Aborted.");
                    return Ok(());
                }
            }
        }
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after the current file...");
        handler_token.cancel();
    })
    .context("could not install Ctrl-C handler")?;

    let options = ProcessOptions {
        root: target,
        max_depth,
        exclude: vec![backup_dir],
    };
    let control = ProcessControl::new().with_cancel_token(token);
    let provider = exiftool.as_ref().map(|t| t as &dyn MetadataProvider);
    let mut rng = rand::rng();

    let result = media_sorter_core::process(
        &options,
        &settings,
        provider,
        &mut rng,
        &control,
        &|current, report| {
            let name = |p: &std::path::Path| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            };
            if report.renamed {
                eprintln!(
                    "[{}] {} -> {}",
                    current,
                    name(&report.original),
                    name(&report.final_path)
                );
            } else {
                eprintln!("[{}] {} (unchanged)", current, name(&report.original));
            }
        },
    )?;

    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
    if result.cancelled {
        eprintln!("Cancelled. Files already processed keep their new names.");
    }
    eprintln!(
        "Done! {} media files, {} renamed, {} unchanged, {} enriched, {} failed, {} warnings ({:.2}s)",
        result.total_media,
        result.renamed,
        result.unchanged,
        result.enriched,
        result.failed,
        result.warnings.len(),
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
