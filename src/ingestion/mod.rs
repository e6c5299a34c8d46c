//! Ingestion pipeline module.
//!
//! This module loads citation dataset records into catalog storage. For each
//! record it skips titles that are already stored, maps dataset identifiers to
//! stable catalog UUIDs and inserts the text with its authors, keywords and
//! fields of study.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use citation_network::ingestion::IngestionPipeline;
//! use citation_network::provider::json::JsonFileRecordProvider;
//! use citation_network::storage::sqlite::SqliteStorage;
//!
//! let storage = Arc::new(SqliteStorage::open("catalog.db")?);
//! let pipeline = IngestionPipeline::new(storage, None).with_reference_linking(true);
//!
//! let provider = JsonFileRecordProvider::from_file("dblp_part_17.json").await?;
//! let stats = pipeline.ingest_from_provider(&provider, None).await?;
//! println!("Inserted: {}, Duplicates: {}", stats.inserted, stats.duplicates_skipped);
//! ```
//!
//! Identifiers are UUIDv5 values derived from dataset IDs, so the same
//! dataset author maps to the same catalog author across records and runs.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::embedding::normalize_text;
use crate::models::{AuthorInput, Citation, NamedInput, NewText, Text};
use crate::provider::{DatasetAuthor, DatasetRecord, ProviderError, RecordProvider};
use crate::storage::{CatalogStorage, StorageError};

/// Namespace for text UUIDs derived from dataset record IDs.
pub const TEXT_NAMESPACE: Uuid = Uuid::from_u128(0x5c1e_7a0e_2b1f_4d6a_9e3c_8f10_a7d2_4b01);

/// Namespace for author UUIDs derived from dataset author IDs or names.
pub const AUTHOR_NAMESPACE: Uuid = Uuid::from_u128(0x5c1e_7a0e_2b1f_4d6a_9e3c_8f10_a7d2_4b02);

/// Default number of records handled between progress callbacks.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Duplicate text detected
    #[error("Duplicate text: {0}")]
    Duplicate(String),

    /// Storing a single record failed
    #[error("Insert failed: {0}")]
    InsertFailed(StorageError),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from an ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    /// Total number of input records processed
    pub total_processed: usize,

    /// Number of texts successfully inserted
    pub inserted: usize,

    /// Number of records skipped because the title is already stored
    pub duplicates_skipped: usize,

    /// Number of records that failed to process
    pub failed: usize,

    /// Number of references recorded as citations
    pub citations_linked: usize,
}

impl IngestionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserted(&mut self) {
        self.total_processed += 1;
        self.inserted += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.total_processed += 1;
        self.duplicates_skipped += 1;
    }

    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }

    /// Add the counts of another run to this one.
    pub fn merge(&mut self, other: &IngestionStats) {
        self.total_processed += other.total_processed;
        self.inserted += other.inserted;
        self.duplicates_skipped += other.duplicates_skipped;
        self.failed += other.failed;
        self.citations_linked += other.citations_linked;
    }
}

/// Catalog UUID for a dataset record ID.
pub fn text_uuid(dataset_id: &str) -> Uuid {
    Uuid::new_v5(&TEXT_NAMESPACE, dataset_id.as_bytes())
}

/// Catalog UUID for a dataset author, keyed by dataset ID or, failing that,
/// by name.
pub fn author_uuid(author: &DatasetAuthor) -> Uuid {
    match author.id.as_deref() {
        Some(id) if !id.is_empty() => Uuid::new_v5(&AUTHOR_NAMESPACE, id.as_bytes()),
        _ => Uuid::new_v5(&AUTHOR_NAMESPACE, format!("name:{}", author.name).as_bytes()),
    }
}

/// Convert a dataset record into a text creation payload.
pub fn to_new_text(record: &DatasetRecord) -> NewText {
    NewText {
        id: Some(text_uuid(&record.id)),
        title: record.title.clone(),
        year: record.year,
        n_citation: record.n_citation.unwrap_or(0),
        abstract_text: record.abstract_text.clone().unwrap_or_default(),
        venue_name: record.venue_name().to_string(),
        keywords: record.keywords.iter().map(NamedInput::new).collect(),
        authors: record
            .authors
            .iter()
            .map(|author| AuthorInput {
                id: Some(author_uuid(author)),
                name: author.name.clone(),
                orgs: author
                    .org
                    .iter()
                    .filter(|org| !org.trim().is_empty())
                    .map(NamedInput::new)
                    .collect(),
            })
            .collect(),
        fos: record.fos.iter().map(NamedInput::new).collect(),
        tags: Vec::new(),
    }
}

/// Ingestion pipeline coordinator.
pub struct IngestionPipeline<S>
where
    S: CatalogStorage,
{
    storage: Arc<S>,

    /// Records handled between progress callbacks
    batch_size: usize,

    /// Record dataset references as citations after inserting
    link_references: bool,
}

impl<S> IngestionPipeline<S>
where
    S: CatalogStorage,
{
    /// Create a new pipeline.
    ///
    /// # Arguments
    /// * `storage` - Catalog storage to write into
    /// * `batch_size` - Records per progress step (default: 100)
    pub fn new(storage: Arc<S>, batch_size: Option<usize>) -> Self {
        Self {
            storage,
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            link_references: false,
        }
    }

    pub fn with_reference_linking(mut self, link_references: bool) -> Self {
        self.link_references = link_references;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ingest a batch of records.
    ///
    /// # Errors
    /// Returns `IngestionError::StorageError` if the duplicate check fails
    /// or storage becomes unusable. Inserts rejected for a single record
    /// are counted as failed, not returned.
    pub async fn ingest_batch(&self, records: &[DatasetRecord]) -> IngestionResult<IngestionStats> {
        self.ingest_batch_with(records, |_| {}).await
    }

    /// Ingest a batch of records, calling `on_progress` with the running
    /// totals after every `batch_size` records.
    pub async fn ingest_batch_with<F>(
        &self,
        records: &[DatasetRecord],
        mut on_progress: F,
    ) -> IngestionResult<IngestionStats>
    where
        F: FnMut(&IngestionStats),
    {
        let mut stats = IngestionStats::new();
        let mut inserted: Vec<&DatasetRecord> = Vec::new();

        for chunk in records.chunks(self.batch_size) {
            for record in chunk {
                match self.ingest_single(record).await {
                    Ok(_) => {
                        stats.record_inserted();
                        inserted.push(record);
                    }
                    Err(IngestionError::Duplicate(title)) => {
                        debug!("Skipping duplicate '{}'", title);
                        stats.record_duplicate();
                    }
                    Err(IngestionError::StorageError(e)) => {
                        return Err(IngestionError::StorageError(e));
                    }
                    Err(IngestionError::InsertFailed(e)) if !is_insert_failure(&e) => {
                        return Err(IngestionError::StorageError(e));
                    }
                    Err(e) => {
                        warn!("Failed to ingest record '{}': {}", record.id, e);
                        stats.record_failed();
                    }
                }
            }
            on_progress(&stats);
        }

        if self.link_references {
            stats.citations_linked = self.link_citations(&inserted).await;
        }

        Ok(stats)
    }

    /// Ingest a single record.
    ///
    /// # Errors
    /// Returns `IngestionError::Duplicate` if a text with the same
    /// normalized title or ID exists, `IngestionError::InvalidInput`
    /// for a blank title, `IngestionError::StorageError` if the duplicate
    /// check fails and `IngestionError::InsertFailed` if the insert fails
    pub async fn ingest_single(&self, record: &DatasetRecord) -> IngestionResult<Text> {
        let normalized_title = normalize_text(&record.title);
        if normalized_title.is_empty() {
            return Err(IngestionError::InvalidInput(format!(
                "Record '{}' has no title",
                record.id
            )));
        }

        if self.storage.exists_by_title(&normalized_title).await? {
            return Err(IngestionError::Duplicate(record.title.clone()));
        }

        match self.storage.insert_text(&to_new_text(record)).await {
            Ok(text) => Ok(text),
            Err(StorageError::DuplicateEntry(_)) => Err(IngestionError::Duplicate(record.title.clone())),
            Err(e) => Err(IngestionError::InsertFailed(e)),
        }
    }

    /// Fetch records from a provider and ingest them.
    ///
    /// # Arguments
    /// * `provider` - Record source
    /// * `limit` - Only ingest the first `limit` records when set
    pub async fn ingest_from_provider<P>(
        &self,
        provider: &P,
        limit: Option<usize>,
    ) -> IngestionResult<IngestionStats>
    where
        P: RecordProvider + ?Sized,
    {
        let records = match limit {
            Some(limit) => provider.fetch_records_limit(limit).await?,
            None => provider.fetch_records().await?,
        };
        debug!("Fetched {} records from {}", records.len(), provider.name());
        self.ingest_batch(&records).await
    }

    async fn link_citations(&self, records: &[&DatasetRecord]) -> usize {
        let mut linked = 0;
        for record in records {
            let from = text_uuid(&record.id);
            for reference in &record.references {
                let citation = Citation {
                    text_id_from: from,
                    text_id_to: text_uuid(reference),
                };
                match self.storage.insert_citation(&citation).await {
                    Ok(_) => linked += 1,
                    Err(StorageError::InvalidInput(_)) | Err(StorageError::DuplicateEntry(_)) => {
                        debug!("Reference {} of {} not linked", reference, record.id);
                    }
                    Err(e) => warn!("Failed to link reference {} of {}: {}", reference, record.id, e),
                }
            }
        }
        linked
    }
}

/// Storage errors that only affect the record being inserted.
fn is_insert_failure(error: &StorageError) -> bool {
    matches!(
        error,
        StorageError::QueryError(_) | StorageError::InvalidInput(_) | StorageError::SerializationError(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::json::JsonFileRecordProvider;
    use crate::provider::DatasetVenue;
    use crate::storage::sqlite::SqliteStorage;

    fn record(id: &str, title: &str, authors: &[(&str, &str)], references: &[&str]) -> DatasetRecord {
        DatasetRecord {
            id: id.to_string(),
            title: title.to_string(),
            year: Some(2015),
            fos: vec!["Computer science".to_string()],
            n_citation: Some(3),
            abstract_text: Some(format!("About {}", title)),
            references: references.iter().map(|r| r.to_string()).collect(),
            keywords: vec!["graphs".to_string()],
            authors: authors
                .iter()
                .map(|(id, name)| DatasetAuthor {
                    id: Some(id.to_string()),
                    name: name.to_string(),
                    org: Some("MIT".to_string()),
                })
                .collect(),
            venue: Some(DatasetVenue {
                raw: Some("KDD".to_string()),
            }),
        }
    }

    fn pipeline() -> (Arc<SqliteStorage>, IngestionPipeline<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        (storage.clone(), IngestionPipeline::new(storage, Some(2)))
    }

    #[test]
    fn test_to_new_text_maps_fields() {
        let rec = record("r1", "Paper", &[("a1", "Ann")], &[]);
        let text = to_new_text(&rec);
        assert_eq!(text.id, Some(text_uuid("r1")));
        assert_eq!(text.venue_name, "KDD");
        assert_eq!(text.n_citation, 3);
        assert_eq!(text.authors[0].orgs[0].name, "MIT");
        assert_eq!(text.fos[0].name, "Computer science");
    }

    #[test]
    fn test_uuids_are_stable() {
        assert_eq!(text_uuid("abc"), text_uuid("abc"));
        assert_ne!(text_uuid("abc"), text_uuid("abd"));

        let named = DatasetAuthor {
            id: None,
            name: "Ann".to_string(),
            org: None,
        };
        assert_eq!(author_uuid(&named), author_uuid(&named.clone()));
        let with_id = DatasetAuthor {
            id: Some("x".to_string()),
            ..named.clone()
        };
        assert_ne!(author_uuid(&named), author_uuid(&with_id));
    }

    #[tokio::test]
    async fn test_same_dataset_author_maps_to_one_catalog_author() {
        let (storage, pipeline) = pipeline();
        let records = vec![
            record("r1", "First", &[("a1", "Ann"), ("a2", "Bob")], &[]),
            record("r2", "Second", &[("a1", "Ann")], &[]),
        ];
        let stats = pipeline.ingest_batch(&records).await.unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(storage.list_authors(0, 10).await.unwrap().len(), 2);

        let second = storage.get_text(text_uuid("r2")).await.unwrap();
        let first = storage.get_text(text_uuid("r1")).await.unwrap();
        assert_eq!(first.authors[0].id, second.authors[0].id);
    }

    #[tokio::test]
    async fn test_deduplication_by_normalized_title() {
        let (_, pipeline) = pipeline();
        let records = vec![
            record("r1", "Deep Learning", &[], &[]),
            record("r2", "  deep   LEARNING ", &[], &[]),
            record("r3", "Other", &[], &[]),
        ];
        let stats = pipeline.ingest_batch(&records).await.unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.duplicates_skipped, 1);
        assert_eq!(stats.total_processed, 3);
    }

    #[tokio::test]
    async fn test_rerun_skips_everything() {
        let (_, pipeline) = pipeline();
        let records = vec![record("r1", "A", &[], &[]), record("r2", "B", &[], &[])];
        pipeline.ingest_batch(&records).await.unwrap();
        let stats = pipeline.ingest_batch(&records).await.unwrap();
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.duplicates_skipped, 2);
    }

    #[tokio::test]
    async fn test_blank_title_counts_as_failed() {
        let (_, pipeline) = pipeline();
        let stats = pipeline
            .ingest_batch(&[record("r1", "   ", &[], &[])])
            .await
            .unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.inserted, 0);
    }

    #[tokio::test]
    async fn test_failing_duplicate_check_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let storage = Arc::new(SqliteStorage::open(&path).unwrap());
        let pipeline = IngestionPipeline::new(storage, None);

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE texts;")
            .unwrap();

        let result = pipeline.ingest_batch(&[record("r1", "A", &[], &[])]).await;
        assert!(matches!(
            result,
            Err(IngestionError::StorageError(StorageError::QueryError(_)))
        ));
    }

    #[tokio::test]
    async fn test_progress_called_per_chunk() {
        let (_, pipeline) = pipeline();
        let records: Vec<DatasetRecord> = (0..5)
            .map(|i| record(&format!("r{}", i), &format!("T{}", i), &[], &[]))
            .collect();

        let mut seen = Vec::new();
        pipeline
            .ingest_batch_with(&records, |stats| seen.push(stats.total_processed))
            .await
            .unwrap();
        assert_eq!(seen, vec![2, 4, 5]);
    }

    #[tokio::test]
    async fn test_reference_linking() {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let pipeline = IngestionPipeline::new(storage.clone(), None).with_reference_linking(true);

        // r1 cites a record later in the batch and one missing from it
        let records = vec![
            record("r1", "Citing", &[], &["r2", "missing"]),
            record("r2", "Cited", &[], &[]),
        ];
        let stats = pipeline.ingest_batch(&records).await.unwrap();
        assert_eq!(stats.citations_linked, 1);

        let cited = storage.get_text(text_uuid("r2")).await.unwrap();
        assert_eq!(cited.n_citation, 4);
    }

    #[tokio::test]
    async fn test_references_ignored_without_linking() {
        let (storage, pipeline) = pipeline();
        let records = vec![
            record("r1", "Citing", &[], &["r2"]),
            record("r2", "Cited", &[], &[]),
        ];
        let stats = pipeline.ingest_batch(&records).await.unwrap();
        assert_eq!(stats.citations_linked, 0);
        assert_eq!(storage.get_text(text_uuid("r2")).await.unwrap().n_citation, 3);
    }

    #[tokio::test]
    async fn test_ingest_from_provider_with_limit() {
        let (_, pipeline) = pipeline();
        let provider = JsonFileRecordProvider::from_records(vec![
            record("r1", "A", &[], &[]),
            record("r2", "B", &[], &[]),
            record("r3", "C", &[], &[]),
        ]);
        let stats = pipeline.ingest_from_provider(&provider, Some(2)).await.unwrap();
        assert_eq!(stats.inserted, 2);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = IngestionStats::new();
        let mut run = IngestionStats::new();
        run.record_inserted();
        run.record_duplicate();
        run.record_failed();
        run.citations_linked = 2;
        total.merge(&run);
        total.merge(&run);
        assert_eq!(total.total_processed, 6);
        assert_eq!(total.inserted, 2);
        assert_eq!(total.citations_linked, 4);
    }
}
