//! Recommender server entry point.
//!
//! Loads the embedding artifact and serves `/get_neighbors`. Startup fails
//! before the listener is bound when the artifact cannot be loaded or the
//! cold-start list is shorter than the neighbour count.
//!
//! # Examples
//!
//! ```bash
//! recsys-server --embeddings-path embeddings.json
//! EMBEDDINGS_URL=https://example.org/embeddings.json recsys-server --port 8001
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use citation_network::{
    embedding::artifact::ArtifactSource,
    recommend::{Recommender, RecommenderConfig, DEFAULT_NEIGHBOR_COUNT},
    server::{
        recsys::{router, RecsysState},
        serve, ServerConfig,
    },
};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Embedding-based recommender service
#[derive(Parser, Debug)]
#[command(
    name = "recsys-server",
    version,
    about = "Serve text recommendations from pretrained embeddings",
    long_about = "Recommends texts for a viewing history by ranking items around a recency-weighted mean embedding.

EXAMPLES:
  Local artifact:
    recsys-server --embeddings-path embeddings.json

  Download the artifact on startup:
    recsys-server --embeddings-url https://example.org/embeddings.json --embeddings-path cache/embeddings.json

  Custom cold-start list:
    recsys-server --cold-start id1,id2,id3"
)]
struct Args {
    /// Embedding artifact on disk (download target when --embeddings-url is set)
    #[arg(long, env = "EMBEDDINGS_PATH", value_name = "PATH", default_value = "embeddings.json")]
    embeddings_path: PathBuf,

    /// URL to download the embedding artifact from
    #[arg(long, env = "EMBEDDINGS_URL", value_name = "URL")]
    embeddings_url: Option<String>,

    /// Items returned for an empty history (comma separated)
    #[arg(long, env = "CN_COLD_START", value_name = "IDS", value_delimiter = ',')]
    cold_start: Vec<String>,

    /// Neighbours returned per request
    #[arg(long, env = "CN_NEIGHBOR_COUNT", value_name = "N", default_value_t = DEFAULT_NEIGHBOR_COUNT)]
    neighbor_count: usize,

    /// Address to bind
    #[arg(long, env = "CN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "CN_RECSYS_PORT", default_value = "8001")]
    port: u16,

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

fn artifact_source(args: &Args) -> ArtifactSource {
    match &args.embeddings_url {
        Some(url) => ArtifactSource::Remote {
            url: url.clone(),
            cache_path: args.embeddings_path.clone(),
        },
        None => ArtifactSource::Local(args.embeddings_path.clone()),
    }
}

fn recommender_config(args: &Args) -> RecommenderConfig {
    let cold_start: Vec<String> = args
        .cold_start
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    if cold_start.is_empty() {
        RecommenderConfig::default()
    } else {
        RecommenderConfig { cold_start }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = recommender_config(&args);
    config
        .validate(args.neighbor_count)
        .context("Invalid --cold-start / --neighbor-count combination")?;

    let source = artifact_source(&args);
    debug!("Embedding source: {:?}", source);
    let table = source
        .load()
        .await
        .context("Failed to load embedding artifact")?;
    info!(
        "Loaded {} embeddings of dimension {}",
        table.len(),
        table.dimension()
    );

    let recommender = Recommender::new(table, config);
    let state = RecsysState::new(Some(recommender), args.neighbor_count);

    let server_config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        neighbor_count: args.neighbor_count,
        ..ServerConfig::default()
    };

    serve(router(state), &server_config)
        .await
        .with_context(|| format!("Server on {} failed", server_config.addr()))
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
