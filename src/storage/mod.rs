//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving the
//! citation network catalog: texts with their keywords, authors, fields of
//! study and tags, plus citations and users. The abstraction allows for
//! different storage backends while keeping a consistent API.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Author, AuthorInput, Authorship, Citation, NewText, Text, User};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate entry (e.g., same login or citation already exists)
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// The request violates a catalog rule (e.g., a text citing itself)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog storage backends.
///
/// All methods take `&self`; implementations handle their own
/// synchronization so a single instance can be shared behind an `Arc`.
///
/// Listing and filter methods return rows in insertion order.
#[async_trait]
pub trait CatalogStorage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.).
    ///
    /// This should be idempotent and safe to call multiple times.
    async fn initialize(&self) -> StorageResult<()>;

    // ----- Texts -----

    /// Insert a text, creating or reusing its keywords, fields of study,
    /// tags and organizations by name and its authors by ID.
    ///
    /// # Returns
    /// The stored text with all relations resolved
    async fn insert_text(&self, text: &NewText) -> StorageResult<Text>;

    /// Get a text by ID.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if the text doesn't exist
    async fn get_text(&self, id: Uuid) -> StorageResult<Text>;

    /// List texts with offset pagination.
    async fn list_texts(&self, skip: usize, limit: usize) -> StorageResult<Vec<Text>>;

    /// Delete a text and its relation rows and citations.
    ///
    /// # Returns
    /// The text as it was before deletion
    async fn delete_text(&self, id: Uuid) -> StorageResult<Text>;

    /// Get the total count of texts in storage.
    async fn count_texts(&self) -> StorageResult<usize>;

    /// Check if a text with the given normalized title exists.
    async fn exists_by_title(&self, normalized_title: &str) -> StorageResult<bool>;

    // ----- Search predicates -----

    /// Texts carrying a tag named exactly `tag`.
    async fn texts_with_tag(&self, tag: &str, limit: usize) -> StorageResult<Vec<Text>>;

    /// Texts with an author named exactly `author`.
    async fn texts_by_author(&self, author: &str, limit: usize) -> StorageResult<Vec<Text>>;

    /// Texts whose venue name contains `fragment` (case-sensitive).
    async fn texts_with_venue_containing(
        &self,
        fragment: &str,
        limit: usize,
    ) -> StorageResult<Vec<Text>>;

    /// Texts published in `year`.
    async fn texts_from_year(&self, year: i32, limit: usize) -> StorageResult<Vec<Text>>;

    // ----- Authors -----

    async fn insert_author(&self, author: &AuthorInput) -> StorageResult<Author>;

    /// # Errors
    /// Returns `StorageError::NotFound` if the author doesn't exist
    async fn get_author(&self, id: Uuid) -> StorageResult<Author>;

    async fn list_authors(&self, skip: usize, limit: usize) -> StorageResult<Vec<Author>>;

    /// Replace an author's name and organizations.
    async fn update_author(&self, id: Uuid, author: &AuthorInput) -> StorageResult<Author>;

    async fn delete_author(&self, id: Uuid) -> StorageResult<Author>;

    // ----- Citations -----

    /// Record that `text_id_from` cites `text_id_to` and bump the cited
    /// text's citation count.
    ///
    /// # Errors
    /// Returns `StorageError::InvalidInput` for self-citations or unknown
    /// texts and `StorageError::DuplicateEntry` if the citation exists.
    async fn insert_citation(&self, citation: &Citation) -> StorageResult<Citation>;

    // ----- Users -----

    /// # Errors
    /// Returns `StorageError::DuplicateEntry` if the login is taken
    async fn insert_user(&self, user: &User) -> StorageResult<User>;

    async fn get_user_by_login(&self, login: &str) -> StorageResult<Option<User>>;

    async fn get_user_by_id(&self, id: Uuid) -> StorageResult<Option<User>>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StorageResult<User>;

    // ----- Graph -----

    /// Author IDs of each text, in insertion order.
    ///
    /// # Arguments
    /// * `limit` - Only read the first `limit` texts when set
    async fn authorship(&self, limit: Option<usize>) -> StorageResult<Vec<Authorship>>;
}
