//! Ingestion pipeline binary entry point.
//!
//! This binary loads a citation dataset dump (JSON array or JSON Lines) into
//! the catalog database.
//!
//! # Examples
//!
//! Load a dataset:
//! ```bash
//! ingestion --input dblp.json --db-path citations.db
//! ```
//!
//! Load the first 1000 records and record their references as citations:
//! ```bash
//! ingestion --input dblp.json --limit 1000 --link-references
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use citation_network::{
    ingestion::{IngestionPipeline, DEFAULT_BATCH_SIZE},
    provider::{json::JsonFileRecordProvider, RecordProvider},
    storage::{sqlite::SqliteStorage, CatalogStorage},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ingestion CLI for building and updating the catalog database
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Load a citation dataset into the catalog database",
    long_about = "Ingestion pipeline for citation dataset dumps. Records whose normalized title is already stored are skipped.

EXAMPLES:
  Load a dataset:
    ingestion --input dblp.json --db-path citations.db

  Load a sample and link references:
    ingestion --input dblp.json --limit 1000 --link-references

  Custom batch size and logging:
    ingestion --input dblp.json --batch-size 50 --log-level debug"
)]
struct IngestionArgs {
    /// Input file with dataset records (JSON array or JSON Lines)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Database file path
    #[arg(long, env = "CN_DB_PATH", value_name = "PATH", default_value = "citations.db")]
    db_path: PathBuf,

    /// Only ingest the first N records
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Record dataset references between ingested texts as citations
    #[arg(long)]
    link_references: bool,

    /// Number of records per progress step
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Open the database, creating its directory if needed
fn create_storage(db_path: &Path) -> Result<SqliteStorage> {
    debug!("Opening SQLite storage at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            info!("Created database directory: {:?}", parent);
        }
    }

    SqliteStorage::open(db_path).with_context(|| format!("Failed to open database {:?}", db_path))
}

/// Create a progress bar for tracking ingestion
fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} records | Inserted: {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb
}

async fn run(args: IngestionArgs) -> Result<()> {
    let start_time = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {:?}", args.input);
    }
    info!("Input file: {:?}", args.input);

    let storage = Arc::new(create_storage(&args.db_path)?);
    storage
        .initialize()
        .await
        .context("Failed to initialize database schema")?;
    info!("Database path: {:?}", args.db_path);

    let pipeline = IngestionPipeline::new(storage.clone(), Some(args.batch_size))
        .with_reference_linking(args.link_references);

    let provider = JsonFileRecordProvider::from_file(&args.input)
        .await
        .with_context(|| format!("Failed to load records from {:?}", args.input))?;

    let records = match args.limit {
        Some(limit) => provider.fetch_records_limit(limit).await?,
        None => provider.fetch_records().await?,
    };
    info!("Found {} records from {}", records.len(), provider.name());

    if records.is_empty() {
        warn!("No records found in input file");
        return Ok(());
    }

    let progress = create_progress_bar(records.len());
    progress.set_message("0");

    info!("Processing records with batch_size={}...", pipeline.batch_size());
    let stats = pipeline
        .ingest_batch_with(&records, |stats| {
            progress.set_position(stats.total_processed as u64);
            progress.set_message(stats.inserted.to_string());
        })
        .await
        .context("Failed to ingest records")?;

    progress.finish_with_message(stats.inserted.to_string());

    let stored = storage.count_texts().await.context("Failed to count texts")?;

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Ingestion Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Duplicates skipped:   {:>16} ║", stats.duplicates_skipped);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Citations linked:     {:>16} ║", stats.citations_linked);
    println!("║ Texts in database:    {:>16} ║", stored);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    if stats.failed > 0 {
        warn!(
            "{} records failed to process - check logs for details",
            stats.failed
        );
    }

    info!("Ingestion completed");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = IngestionArgs::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
    debug!("CLI arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Ingestion failed: {:#}", e);
        std::process::exit(1);
    }
}
