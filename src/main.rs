//! # Schema Sync CLI (`schemasync`)
//!
//! ## Usage
//!
//! ```bash
//! schemasync --config ./config/schemasync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `schemasync scan <path>` | Show the collections found in a file or tree |
//! | `schemasync plan <path>` | Show the operations a sync would perform |
//! | `schemasync create <path>` | Create missing collections and their attributes |
//! | `schemasync update <path>` | Create missing attributes and update existing ones |
//!
//! Store settings come from the `[store]` table or from `API_ENDPOINT`,
//! `PROJECT_ID`, `DATABASE_ID` and `API_KEY`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use schema_sync::config;
use schema_sync::progress::ProgressMode;
use schema_sync::sync;

/// Synchronize Python model declarations into an Appwrite database.
#[derive(Parser)]
#[command(
    name = "schemasync",
    about = "Synchronize Python model declarations into an Appwrite database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/schemasync.toml`. A missing file is fine when
    /// the store settings come from the environment.
    #[arg(long, global = true, default_value = "./config/schemasync.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to human when stderr is a TTY.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file or directory and print the collections found.
    ///
    /// Does not contact the store.
    Scan {
        /// Python file or directory to scan.
        path: PathBuf,

        /// Print descriptors as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the operations a sync would perform.
    Plan {
        /// Python file or directory to scan.
        path: PathBuf,

        /// Plan in update mode instead of create-only mode.
        #[arg(long)]
        update: bool,

        /// Plan against a saved collection list instead of the live store.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Create collections that do not exist yet.
    ///
    /// Existing collections are skipped entirely, never partially updated.
    Create {
        /// Python file or directory to scan.
        path: PathBuf,

        /// Apply against an in-memory copy of the live schema.
        #[arg(long)]
        dry_run: bool,
    },

    /// Create missing attributes and update existing ones.
    ///
    /// Settings omitted from the declaration keep their remote value.
    /// Remote attributes that are not declared are left alone.
    Update {
        /// Python file or directory to scan.
        path: PathBuf,

        /// Apply against an in-memory copy of the live schema.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Scan { path, json } => {
            sync::run_scan(&cfg, &path, json, reporter.as_ref())?;
        }
        Commands::Plan {
            path,
            update,
            snapshot,
        } => {
            sync::run_plan(&cfg, &path, update, snapshot.as_deref(), reporter.as_ref())?;
        }
        Commands::Create { path, dry_run } => {
            sync::run_create(&cfg, &path, dry_run, reporter.as_ref())?;
        }
        Commands::Update { path, dry_run } => {
            sync::run_update(&cfg, &path, dry_run, reporter.as_ref())?;
        }
    }

    Ok(())
}
