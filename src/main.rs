//! `tankobon`: seed the comic reader database from JSON files.

use clap::Parser;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tankobon_config::{Overrides, SeedConfig, SeedFlags, Settings};
use tankobon_db::{DEFAULT_MAX_CONNECTIONS, Database};
use tankobon_seed::error::{ErrorKind, Result};
use tankobon_seed::{SeedSummary, run_seed};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tankobon")]
#[command(about = "Seed users, comics and chapters from JSON files")]
#[command(version)]
struct Cli {
    /// Seed users
    #[arg(long)]
    users: bool,
    /// Seed comics
    #[arg(long)]
    comics: bool,
    /// Seed chapters
    #[arg(long)]
    chapters: bool,
    /// Seed every entity type (the default when none is selected)
    #[arg(long)]
    all: bool,
    /// Validate and report without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Keep source image URLs instead of uploading them
    #[arg(long)]
    skip_images: bool,
    /// Overwrite records that already exist
    #[arg(short, long)]
    force: bool,
    /// Records per batch
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,
    #[arg(short, long)]
    verbose: bool,
    /// Delete existing rows of the selected entity types first
    #[arg(long)]
    clear: bool,
    /// Delete all rows, uploads and the status file first
    #[arg(long)]
    reset: bool,
    /// Configuration file (toml, yaml or json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Directory containing the seed JSON files
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    /// SQLite database file
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            database: self.database.clone(),
            data_dir: self.data_dir.clone(),
            batch_size: self.batch_size(),
        }
    }

    fn flags(&self) -> SeedFlags {
        SeedFlags {
            users: self.users,
            comics: self.comics,
            chapters: self.chapters,
            all: self.all,
            dry_run: self.dry_run,
            skip_images: self.skip_images,
            force: self.force,
            verbose: self.verbose,
            clear: self.clear,
            reset: self.reset,
            batch_size: self.batch_size(),
        }
    }

    fn batch_size(&self) -> Option<usize> {
        self.batch_size.and_then(|n| usize::try_from(n).ok())
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Logs go to stderr so stdout carries only the summary.
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize tracing: {error}");
    }
}

/// Dry runs read the database but never create, migrate or write it.
async fn open_database(path: &Path, config: &SeedConfig) -> Result<Database> {
    let connections = u32::try_from(config.concurrency).unwrap_or(DEFAULT_MAX_CONNECTIONS);
    let db = if config.dry_run {
        Database::connect_read_only(path, connections).await
    } else {
        Database::connect_with(path, connections).await
    };
    db.or_raise(|| ErrorKind::Database)
}

async fn run(cli: &Cli) -> Result<SeedSummary> {
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides()).or_raise(|| ErrorKind::Configuration)?;
    let config = SeedConfig::resolve(&settings, &cli.flags());
    tracing::debug!(?config, database = %settings.database.display(), "Resolved configuration");
    let db = open_database(&settings.database, &config).await?;
    let summary = run_seed(&settings, config, &db).await;
    db.close().await;
    summary
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            },
            Err(error) => {
                tracing::error!(%error, "Could not serialize summary");
                ExitCode::FAILURE
            },
        },
        Err(error) => {
            tracing::error!("Seed aborted: {error:?}");
            ExitCode::FAILURE
        },
    }
}
