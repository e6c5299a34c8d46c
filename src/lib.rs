//! Citation Network - a backend for browsing and recommending scientific texts.
//!
//! This library provides the core functionality behind two HTTP services and
//! two command-line tools: a catalog API over texts, authors and citations,
//! and an embedding-based recommender that suggests texts from a viewing
//! history.
//!
//! # Architecture
//!
//! - **models**: Catalog entities (Text, Author, Citation, User, etc.)
//! - **embedding**: Pretrained embedding table and artifact loading
//! - **recommend**: Weighted-history recommendations over the embedding table
//! - **storage**: Catalog persistence (SQLite-based)
//! - **search**: Ranked multi-field search
//! - **auth**: Registration, login and password hashing
//! - **classifier**: Tag prediction for new texts
//! - **graph**: Co-authorship graph and its views
//! - **provider**: Dataset record sources
//! - **ingestion**: Offline dataset import
//! - **server**: Axum routers for the catalog API and the recommender
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use citation_network::{
//!     search::{RankedSearchEngine, SearchEngine, SearchFilters, SearchQuery},
//!     storage::sqlite::SqliteStorage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(SqliteStorage::open("citations.db")?);
//!     let engine = RankedSearchEngine::new(storage);
//!
//!     let filters = SearchFilters {
//!         tag: Some("machine learning".to_string()),
//!         ..SearchFilters::default()
//!     };
//!     for hit in engine.search(&SearchQuery::new(filters, None)).await? {
//!         println!("{} ({} matches)", hit.text.title, hit.match_count);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod classifier;
pub mod embedding;
pub mod graph;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod recommend;
pub mod search;
pub mod server;
pub mod storage;

pub use embedding::EmbeddingTable;
pub use models::{Author, Citation, NewText, Text, User};
pub use recommend::Recommender;
pub use search::{SearchEngine, SearchFilters, SearchHit, SearchQuery};
pub use storage::CatalogStorage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
