//! Dataset record provider module.
//!
//! This module defines the interface for sourcing citation dataset records
//! and the record shape of the published DBLP-style dumps.
//!
//! The `RecordProvider` trait abstracts the source of records, allowing the
//! ingestion pipeline to work with different backends without coupling to a
//! specific file layout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod json;

/// Errors that can occur when fetching records from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Other provider-specific errors
    #[error("Provider error: {0}")]
    Other(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Author entry of a dataset record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetAuthor {
    /// Dataset-local author identifier
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub org: Option<String>,
}

/// Venue entry of a dataset record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetVenue {
    #[serde(default)]
    pub raw: Option<String>,
}

/// One publication as it appears in the citation dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetRecord {
    /// Dataset-local text identifier
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub year: Option<i32>,

    /// Fields of study
    #[serde(default)]
    pub fos: Vec<String>,

    #[serde(default)]
    pub n_citation: Option<i64>,

    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,

    /// Dataset IDs of cited records
    #[serde(default)]
    pub references: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub authors: Vec<DatasetAuthor>,

    #[serde(default)]
    pub venue: Option<DatasetVenue>,
}

impl DatasetRecord {
    /// Raw venue name, or empty when the record has none.
    pub fn venue_name(&self) -> &str {
        self.venue
            .as_ref()
            .and_then(|v| v.raw.as_deref())
            .unwrap_or("")
    }
}

/// Trait for sourcing dataset records.
///
/// Providers don't deduplicate; the ingestion pipeline skips titles that
/// are already stored.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Fetch all available records.
    ///
    /// # Errors
    /// Returns `ProviderError` if records cannot be fetched or parsed
    async fn fetch_records(&self) -> ProviderResult<Vec<DatasetRecord>>;

    /// Fetch at most `limit` records.
    async fn fetch_records_limit(&self, limit: usize) -> ProviderResult<Vec<DatasetRecord>> {
        let all = self.fetch_records().await?;
        Ok(all.into_iter().take(limit).collect())
    }

    /// Total number of records available, used for progress reporting.
    async fn count_records(&self) -> ProviderResult<usize> {
        self.fetch_records().await.map(|records| records.len())
    }

    /// Human-readable name of this provider for logging.
    fn name(&self) -> &str;
}
