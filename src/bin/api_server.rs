//! Catalog API server entry point.
//!
//! Serves CRUD, search, auth and graph endpoints over a SQLite catalog.
//!
//! # Examples
//!
//! ```bash
//! api-server --db-path citations.db --port 8000
//! CN_CLASSIFIER_URL=http://localhost:8500 api-server
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use citation_network::{
    classifier::{http::HttpTagClassifier, TagClassifier},
    server::{
        api::{router, ApiState},
        serve, ServerConfig,
    },
    storage::{sqlite::SqliteStorage, CatalogStorage},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Catalog API server for the citation network
#[derive(Parser, Debug)]
#[command(
    name = "api-server",
    version,
    about = "Serve the citation network catalog API",
    long_about = "HTTP API for texts, authors, citations, users, ranked search and the co-authorship graph.

EXAMPLES:
  Serve a local database:
    api-server --db-path citations.db

  Enable tag prediction for /text/add/:
    api-server --classifier-url http://localhost:8500"
)]
struct Args {
    /// Database file path
    #[arg(long, env = "CN_DB_PATH", value_name = "PATH", default_value = "citations.db")]
    db_path: PathBuf,

    /// Address to bind
    #[arg(long, env = "CN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "CN_PORT", default_value = "8000")]
    port: u16,

    /// Base URL of the tag classification service
    #[arg(long, env = "CN_CLASSIFIER_URL", value_name = "URL")]
    classifier_url: Option<String>,

    /// Raw hits fetched per search predicate
    #[arg(long, env = "CN_SEARCH_PAGE_LIMIT", value_name = "N", default_value = "20")]
    search_page_limit: usize,

    /// Timeout for classifier requests in seconds
    #[arg(long, env = "CN_REQUEST_TIMEOUT", value_name = "SECS", default_value = "30")]
    request_timeout: u64,

    /// Logging verbosity level
    #[arg(long, env = "CN_LOG_LEVEL", value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            info!("Created database directory: {:?}", parent);
        }
    }

    SqliteStorage::open(db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))
}

fn create_classifier(args: &Args) -> Result<Option<Arc<dyn TagClassifier>>> {
    let Some(url) = &args.classifier_url else {
        warn!("No classifier configured; /text/add/ will answer 503");
        return Ok(None);
    };

    let classifier = HttpTagClassifier::new(url, Duration::from_secs(args.request_timeout))
        .context("Failed to create classifier client")?;
    info!("Tag classifier at {}", classifier.endpoint());
    Ok(Some(Arc::new(classifier)))
}

async fn run(args: Args) -> Result<()> {
    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        search_page_limit: args.search_page_limit,
        request_timeout_secs: args.request_timeout,
        ..ServerConfig::default()
    };

    let storage = Arc::new(open_storage(&args.db_path)?);
    storage
        .initialize()
        .await
        .context("Failed to initialize database schema")?;
    let texts = storage.count_texts().await.context("Failed to count texts")?;
    info!("Database {:?} holds {} texts", args.db_path, texts);

    let classifier = create_classifier(&args)?;
    let state = ApiState::new(storage, classifier, &config);

    serve(router(state), &config)
        .await
        .with_context(|| format!("Server on {} failed", config.addr()))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}
