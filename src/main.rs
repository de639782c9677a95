//! RGSS script host - CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use rgss_host::bundle::{Bundle, LoadError, OpenFailurePolicy, ScriptLoader};
use rgss_host::host::{archive, save_data};
use rgss_host::util::config::{resolve_config, HostConfig};
use rgss_host::util::logger::{self, LogLevel};
use rgss_host::{NAME, VERSION};

/// Inspect and rebuild RGSS script containers
#[derive(Parser, Debug)]
#[command(name = "rgss-host")]
#[command(author = "YaoXiang Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the usual lookup order)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the scripts a container would run
    List {
        /// Script container
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Extract scripts into a directory
    Unpack {
        /// Script container
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Build a container from an unpacked directory
    Pack {
        /// Directory written by `unpack`
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Output container
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Check that a container loads
    Check {
        /// Script container
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = resolve_config(args.config.as_deref()).context("Failed to load config")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level
    };
    logger::init_with_level(level);

    if args.verbose {
        eprintln!("{} version: {}", NAME, VERSION);
        match &source {
            Some(path) => eprintln!("Config: {}", path.display()),
            None => eprintln!("Config: defaults"),
        }
    }

    match args.command {
        Commands::List { file } => {
            let bundle = open(&config, &file)?;
            for unit in bundle.units() {
                println!(
                    "{:>4}  {:>6}  {:<32}  {}",
                    unit.position,
                    unit.index,
                    unit.name,
                    unit.source.len()
                );
            }
        }
        Commands::Unpack { file, output } => {
            let bundle = open(&config, &file)?;
            let index = archive::unpack(&bundle, &output)
                .with_context(|| format!("Failed to unpack into: {}", output.display()))?;
            eprintln!("Unpacked {} scripts to {}", index.scripts.len(), output.display());
        }
        Commands::Pack { dir, output } => {
            let entries = archive::pack(&dir).with_context(|| format!("Failed to pack: {}", dir.display()))?;
            save_data(&output, &entries).with_context(|| format!("Failed to write: {}", output.display()))?;
            eprintln!("Packed {} scripts into {}", entries.len(), output.display());
        }
        Commands::Check { file } => {
            let bundle = open(&config, &file)?;
            let report = bundle.report();
            println!("{} {}", "ok".green(), file.display());
            println!("  scripts:   {}", bundle.len());
            println!("  entries:   {}", report.raw_entries);
            if report.dropped > 0 {
                println!("  dropped:   {}", report.dropped.yellow());
            }
            if report.decompress_failures > 0 {
                println!("  corrupt:   {}", report.decompress_failures.red());
            }
            if report.synthesized_names > 0 {
                println!("  unnamed:   {}", report.synthesized_names);
            }
        }
    }

    Ok(())
}

/// Load a container, failing when it cannot be opened.
fn open(
    config: &HostConfig,
    file: &Path,
) -> Result<Bundle> {
    let mut loader_config = config.loader.clone();
    loader_config.on_open_failure = OpenFailurePolicy::Fail;
    let loader = ScriptLoader::with_config(loader_config);

    match loader.load(file) {
        Ok(bundle) => Ok(bundle),
        Err(err @ LoadError::Deserialize(_)) => {
            eprintln!("{} {}", "error".red(), file.display());
            Err(err).with_context(|| format!("Failed to read: {}", file.display()))
        }
        Err(err) => Err(err).with_context(|| format!("Failed to open: {}", file.display())),
    }
}

