//! yolosplit CLI - class-capped dataset versions for object detection training.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use yolosplit_data::pipeline::EXAMPLE_CONFIG;
use yolosplit_data::{Config, VersionDriver, VersionReport};

#[derive(Parser)]
#[command(name = "yolosplit")]
#[command(version)]
#[command(about = "Build class-capped train/val/test dataset versions with a shared test set")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "yolosplit.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert raw pixel-box annotations into detection labels
    Convert,

    /// Gather a pre-split dataset into the source pool
    Flatten {
        /// Copy files instead of moving them
        #[arg(long)]
        keep_source: bool,
    },

    /// Build every configured version, then unify their test sets
    Split {
        /// Output root, overriding the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Leave each version's own test set untouched
        #[arg(long)]
        no_unify: bool,
    },

    /// Build a single dataset split by ratios
    Ratio {
        /// Output root, overriding the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Unify the test sets of versions already on disk
    Unify {
        /// Output root, overriding the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

fn print_version(report: &VersionReport) {
    println!(
        "{:<16} train {:>5}  val {:>5}  test {:>5}  negatives {:>3}  ({} ms)",
        report.name, report.train, report.val, report.test, report.negatives,
        report.processing_time_ms
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            println!("{EXAMPLE_CONFIG}");
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            info!("Configuration is valid");
            info!(
                "  Source: {:?} / {:?} ({})",
                config.source.images_dir, config.source.labels_dir, config.source.image_ext
            );
            info!("  Output root: {:?}", config.output.root);
            for version in &config.versions {
                info!(
                    "  Version {}: train cap {}, val cap {}, seed {}",
                    version.name, version.train_cap, version.val_cap, version.seed
                );
            }
            if let Some(negatives) = &config.negatives {
                info!(
                    "  Negatives: {} from {:?}",
                    negatives.train_samples, negatives.dir
                );
            }
        }

        Commands::Convert => {
            let driver = VersionDriver::new(load_config(&cli.config)?)?;
            let stats = driver.convert().context("Annotation conversion failed")?;

            println!("\n=== Conversion Complete ===");
            println!("Converted:   {}", stats.converted);
            println!("Objects:     {}", stats.objects);
            println!("No image:    {}", stats.skipped_missing_image);
        }

        Commands::Flatten { keep_source } => {
            let mut config = load_config(&cli.config)?;
            if keep_source {
                if let Some(flatten) = config.flatten.as_mut() {
                    flatten.keep_source = true;
                }
            }
            let driver = VersionDriver::new(config)?;
            let stats = driver.flatten().context("Flattening failed")?;

            println!("\n=== Flatten Complete ===");
            println!("Images:      {}", stats.images);
            println!("Labels:      {}", stats.labels);
        }

        Commands::Split {
            output,
            report,
            no_unify,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(root) = output {
                config.output.root = root;
            }
            if report.is_some() {
                config.output.report = report;
            }
            if no_unify {
                config.output.unify_test = false;
            }

            let driver = VersionDriver::new(config)?;
            let run = driver.run().context("Dataset split failed")?;

            println!("\n=== Split Complete ===");
            println!("Examples:    {}", run.examples);
            println!("No image:    {}", run.skipped_without_image);
            for version in &run.versions {
                print_version(version);
            }
            if let Some(unify) = &run.unify {
                println!("Shared test: {}", unify.common);
                for version in &unify.versions {
                    println!("  {:<14} evicted {}", version.version, version.evicted);
                }
            }
            if let Some(path) = &driver.config().output.report {
                println!("Report:      {path:?}");
            }
        }

        Commands::Ratio { output } => {
            let mut config = load_config(&cli.config)?;
            if let Some(root) = output {
                config.output.root = root;
            }

            let driver = VersionDriver::new(config)?;
            let report = driver.run_ratio().context("Ratio split failed")?;

            println!("\n=== Ratio Split Complete ===");
            print_version(&report);
        }

        Commands::Unify { output } => {
            let mut config = load_config(&cli.config)?;
            if let Some(root) = output {
                config.output.root = root;
            }

            let driver = VersionDriver::new(config)?;
            let report = driver
                .unify_existing()
                .context("Test set unification failed")?;

            println!("\n=== Unification Complete ===");
            println!("Shared test: {}", report.common);
            for version in &report.versions {
                println!(
                    "  {:<14} evicted {:>4}  files removed {:>4}",
                    version.version, version.evicted, version.files_removed
                );
            }
        }
    }

    Ok(())
}
