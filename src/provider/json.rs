//! JSON file record provider.
//!
//! Reads either a JSON array of records or JSON Lines (one record per line).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{DatasetRecord, ProviderError, ProviderResult, RecordProvider};

/// Provider serving records loaded from a local JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileRecordProvider {
    path: PathBuf,
    name: String,
    records: Vec<DatasetRecord>,
}

impl JsonFileRecordProvider {
    /// Load and parse a dataset file.
    ///
    /// # Errors
    /// Returns `ProviderError::IoError` if the file cannot be read and
    /// `ProviderError::ParseError` if a record is malformed
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path).await?;
        let records = parse_records(&content)?;
        info!("Loaded {} records from {}", records.len(), path.display());

        Ok(Self {
            name: format!("json:{}", path.display()),
            path,
            records,
        })
    }

    /// Wrap records that are already in memory.
    pub fn from_records(records: Vec<DatasetRecord>) -> Self {
        Self {
            path: PathBuf::new(),
            name: "json:memory".to_string(),
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a JSON array or JSON Lines document.
pub fn parse_records(content: &str) -> ProviderResult<Vec<DatasetRecord>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| ProviderError::ParseError(e.to_string()));
    }

    debug!("Parsing records as JSON Lines");
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| ProviderError::ParseError(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

#[async_trait]
impl RecordProvider for JsonFileRecordProvider {
    async fn fetch_records(&self) -> ProviderResult<Vec<DatasetRecord>> {
        Ok(self.records.clone())
    }

    async fn fetch_records_limit(&self, limit: usize) -> ProviderResult<Vec<DatasetRecord>> {
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    async fn count_records(&self) -> ProviderResult<usize> {
        Ok(self.records.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
