//! Mosaic CLI - perceptual fingerprinting and near-duplicate image search.
//!
//! Mosaic ingests images into a local catalog, fingerprints them with a
//! 256-bit perceptual hash, and finds visually similar images by Hamming
//! distance.
//!
//! # Usage
//!
//! ```bash
//! # Fingerprint a file without storing it
//! mosaic hash photo.jpg
//!
//! # Ingest a directory into the catalog
//! mosaic ingest ./photos/
//!
//! # Find near-duplicates of a stored image
//! mosaic similar 01920c4e-7d1a-7b3c-9f00-2a6b1c0d9e11 --max-distance 12
//!
//! # View configuration
//! mosaic config show
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mosaic_core::Config;
use tokio_util::sync::CancellationToken;

mod cli;
mod logging;

/// Mosaic - perceptual fingerprinting and near-duplicate image search.
#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MOSAIC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Fingerprint an image file without storing it
    Hash(cli::hash::HashArgs),

    /// Hamming distance between two perceptual hashes
    Distance(cli::hash::DistanceArgs),

    /// Ingest an image file, directory or URL into the catalog
    Ingest(cli::ingest::IngestArgs),

    /// Search the catalog by perceptual hash
    Search(cli::search::SearchArgs),

    /// Find images similar to a stored image
    Similar(cli::search::SimilarArgs),

    /// Show a stored image record
    Show(cli::records::ShowArgs),

    /// Delete a stored image and its object
    Delete(cli::records::DeleteArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let loaded = if config_path.exists() {
        Config::load_from(&config_path)
    } else {
        Ok(Config::default())
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `mosaic config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Mosaic v{}", mosaic_core::VERSION);

    // Ctrl-C cancels in-flight fetches, analysis and hydration
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, canceling");
            on_interrupt.cancel();
        }
    });

    let output = cli::output::Output::new(cli.pretty);

    match cli.command {
        Commands::Hash(args) => cli::hash::execute_hash(args, &config, &output).await,
        Commands::Distance(args) => cli::hash::execute_distance(args, &output),
        Commands::Ingest(args) => cli::ingest::execute(args, &config, &output, &cancel).await,
        Commands::Search(args) => cli::search::execute_search(args, &config, &output, &cancel).await,
        Commands::Similar(args) => {
            cli::search::execute_similar(args, &config, &output, &cancel).await
        }
        Commands::Show(args) => cli::records::execute_show(args, &config, &output).await,
        Commands::Delete(args) => cli::records::execute_delete(args, &config, &output).await,
        Commands::Config(args) => cli::config::execute(args, &config, &config_path),
    }
}
