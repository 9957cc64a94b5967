//! tse - Export sprites from a legacy game client
//!
//! This tool converts the client's compressed sprite sheets to PNG, cuts
//! them into per-id tiles, and stitches multi-part sprites back together
//! using the client's appearances file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tse_core::{
    extract_sprites, group_sprites, split_sprites, BatchSummary, ExportConfig, CATALOG_FILE_NAME,
};

/// Export, split and group sprites from the game client
#[derive(Parser, Debug)]
#[command(name = "tse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    paths: PathArgs,

    /// Worker threads (0 = one per CPU)
    #[arg(short, long, global = true, default_value = "0")]
    jobs: usize,

    /// Largest decompressed asset in bytes (0 = unlimited)
    #[arg(long, global = true, default_value_t = tse_core::config::DEFAULT_MAX_DECOMPRESSED_SIZE)]
    max_decompressed_size: u64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct PathArgs {
    /// Client assets directory, or the catalog-content.json inside it
    #[arg(long, global = true, env = "TES_JSON_PATH")]
    catalog: Option<PathBuf>,

    /// Output directory for extracted sprite sheets
    #[arg(short, long, global = true, env = "TES_OUTPUT_DIR", default_value = "./output/extracted")]
    output: PathBuf,

    /// Output directory for per-id tiles
    #[arg(long, global = true, default_value = "./output/split")]
    split_output: PathBuf,

    /// Output directory for grouped sprites
    #[arg(long, global = true, default_value = "./output/grouped")]
    grouped_output: PathBuf,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Convert every sprite sheet listed in the catalog to PNG
    Extract {
        /// Also cut each sheet into tiles right away
        #[arg(long)]
        split: bool,
    },
    /// Cut extracted sheets into per-id tiles
    Split,
    /// Stitch tiles into groups using the appearances file
    Group,
    /// Extract, split and group (default)
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let command = cli.command.unwrap_or(Command::All);
    let config = build_config(&cli, command)?;

    info!(
        catalog = %config.catalog_path().display(),
        output = %config.extracted_dir.display(),
        "Tibia sprites exporter running"
    );

    run_command(command, &config)
}

/// Run the batches selected by `command` in order
fn run_command(command: Command, config: &ExportConfig) -> Result<()> {
    let steps: &[Step] = match command {
        Command::Extract { .. } => &[Step::Extract],
        Command::Split => &[Step::Split],
        Command::Group => &[Step::Group],
        Command::All => &[Step::Extract, Step::Split, Step::Group],
    };

    for step in steps {
        run_step(*step, config)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Extract,
    Split,
    Group,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::Extract => "Extract",
            Step::Split => "Split",
            Step::Group => "Group",
        }
    }
}

/// Run one batch and print its summary
fn run_step(step: Step, config: &ExportConfig) -> Result<BatchSummary> {
    let summary = match step {
        Step::Extract => extract_sprites(config),
        Step::Split => split_sprites(config),
        Step::Group => group_sprites(config),
    }
    .with_context(|| format!("{} failed", step.name()))?;

    println!("{}", format_summary(step.name(), &summary));
    Ok(summary)
}

fn format_summary(name: &str, summary: &BatchSummary) -> String {
    format!(
        "{}: {} exported, {} skipped, {} failed",
        name, summary.exported, summary.skipped, summary.failed
    )
}

/// Fold command line options into the library configuration
fn build_config(cli: &Cli, command: Command) -> Result<ExportConfig> {
    let assets_dir = match &cli.paths.catalog {
        Some(path) => sanitize_catalog_path(&expand_path(path)),
        None => default_catalog_dir()?,
    };

    if !assets_dir.is_dir() {
        bail!("Assets directory does not exist: {}", assets_dir.display());
    }
    let catalog = assets_dir.join(CATALOG_FILE_NAME);
    if !catalog.is_file() {
        bail!(
            "{} not found in directory: {}",
            CATALOG_FILE_NAME,
            assets_dir.display()
        );
    }

    let max_size = match cli.max_decompressed_size {
        0 => None,
        limit => Some(limit),
    };

    Ok(ExportConfig::new(assets_dir)
        .extracted_dir(expand_path(&cli.paths.output))
        .split_dir(expand_path(&cli.paths.split_output))
        .grouped_dir(expand_path(&cli.paths.grouped_output))
        .split_on_extract(matches!(command, Command::Extract { split: true }))
        .jobs(cli.jobs)
        .max_decompressed_size(max_size))
}

/// Accept either the assets directory or the catalog file inside it
fn sanitize_catalog_path(path: &Path) -> PathBuf {
    if path.file_name().is_some_and(|name| name == CATALOG_FILE_NAME) {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        path.to_path_buf()
    }
}

/// Expand a leading `~/` against the home directory
fn expand_path(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Where the client keeps its assets on this platform
fn default_catalog_dir() -> Result<PathBuf> {
    let relative = if cfg!(target_os = "macos") {
        "~/Library/Application Support/CipSoft GmbH/Tibia/packages/Tibia.app/Contents/Resources/assets"
    } else if cfg!(target_os = "windows") {
        "~/AppData/Local/Tibia/packages/Tibia/assets"
    } else if cfg!(target_os = "linux") {
        "~/.local/share/CipSoft GmbH/Tibia/packages/Tibia/assets"
    } else {
        bail!("No default client location on this platform; pass --catalog")
    };
    Ok(expand_path(Path::new(relative)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::OsString;
    use std::fs;
    use tempfile::TempDir;

    fn args(items: &[&str], catalog: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["tse".into()];
        args.extend(items.iter().map(OsString::from));
        args.push("--catalog".into());
        args.push(catalog.as_os_str().to_owned());
        args
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_all() {
        let cli = Cli::try_parse_from(["tse", "--catalog", "/tmp/assets"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.paths.split_output, PathBuf::from("./output/split"));
        assert_eq!(cli.paths.grouped_output, PathBuf::from("./output/grouped"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tse", "extract", "--split", "-j", "3", "--catalog", "/a", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Command::Extract { split: true }));
        assert_eq!(cli.jobs, 3);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.paths.catalog, Some(PathBuf::from("/a")));
    }

    #[test]
    fn test_sanitize_catalog_path() {
        assert_eq!(
            sanitize_catalog_path(Path::new("/games/assets/catalog-content.json")),
            PathBuf::from("/games/assets")
        );
        assert_eq!(
            sanitize_catalog_path(Path::new("/games/assets")),
            PathBuf::from("/games/assets")
        );
    }

    #[test]
    fn test_expand_path_leaves_absolute_path_unchanged() {
        assert_eq!(expand_path(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        assert_eq!(expand_path(Path::new("rel/~x")), PathBuf::from("rel/~x"));
    }

    #[test]
    fn test_expand_path_uses_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_path(Path::new("~/out")), home.join("out"));
        }
    }

    #[test]
    fn test_build_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CATALOG_FILE_NAME), "[]").unwrap();
        let catalog = temp_dir.path().join(CATALOG_FILE_NAME);

        let cli = Cli::try_parse_from(args(
            &["extract", "--split", "--max-decompressed-size", "0"],
            &catalog,
        ))
        .unwrap();
        let command = cli.command.unwrap();
        let config = build_config(&cli, command).unwrap();

        assert_eq!(config.assets_dir, temp_dir.path());
        assert!(config.split_on_extract);
        assert_eq!(config.limits.max_decompressed_size, None);
    }

    #[test]
    fn test_build_config_requires_catalog_file() {
        let temp_dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(args(&[], temp_dir.path())).unwrap();

        let err = build_config(&cli, Command::All).unwrap_err();
        assert!(err.to_string().contains(CATALOG_FILE_NAME));
    }

    fn empty_assets(temp_dir: &TempDir) -> ExportConfig {
        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join(CATALOG_FILE_NAME), "[]").unwrap();
        ExportConfig::new(assets)
            .extracted_dir(temp_dir.path().join("extracted"))
            .split_dir(temp_dir.path().join("split"))
            .grouped_dir(temp_dir.path().join("grouped"))
            .jobs(1)
    }

    #[test]
    fn test_run_single_command() {
        let temp_dir = TempDir::new().unwrap();
        let config = empty_assets(&temp_dir);

        run_command(Command::Extract { split: false }, &config).unwrap();

        assert!(config.extracted_dir.is_dir());
        assert!(!config.split_dir.exists());
    }

    #[test]
    fn test_run_all_stops_at_first_failed_step() {
        let temp_dir = TempDir::new().unwrap();
        let config = empty_assets(&temp_dir);

        let err = run_command(Command::All, &config).unwrap_err();

        // Extract and split succeed on an empty catalog; group has no appearances entry
        assert!(config.extracted_dir.is_dir());
        assert_eq!(err.to_string(), "Group failed");
        assert!(!config.grouped_dir.exists());
    }

    #[test]
    fn test_split_without_extracted_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = empty_assets(&temp_dir);

        let err = run_command(Command::Split, &config).unwrap_err();
        assert_eq!(err.to_string(), "Split failed");
    }

    #[test]
    fn test_format_summary() {
        let summary = BatchSummary {
            exported: 3,
            skipped: 1,
            failed: 0,
        };
        assert_eq!(
            format_summary("Group", &summary),
            "Group: 3 exported, 1 skipped, 0 failed"
        );
    }
}
