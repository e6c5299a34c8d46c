//! Embedding table and vector distance helpers.
//!
//! The recommender works over a precomputed table that maps item IDs to
//! fixed-length vectors. The table is loaded once at startup from a JSON
//! artifact and never mutated afterwards, so it can be shared across request
//! handlers without locking.
//!
//! Iteration order is the order of the artifact file. Rankings use a stable
//! sort, so equal distances keep that order.

pub mod artifact;

use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while building or querying an embedding table.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The artifact could not be read or fetched
    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    /// The artifact could not be parsed
    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),

    /// A vector has a different length than the rest of the table
    #[error("Dimension mismatch for '{id}': expected {expected}, found {found}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    /// An identifier is not present in the table
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// The table has no entries
    #[error("Embedding table is empty")]
    Empty,
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// A ranked entry returned by neighbour searches.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbour {
    /// Item identifier
    pub id: String,

    /// Cosine distance to the query (smaller is closer)
    pub distance: f64,
}

/// Immutable mapping from item ID to embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    vectors: IndexMap<String, Vec<f32>>,
    dimension: usize,
}

impl EmbeddingTable {
    /// Build a table, validating that every vector has the same non-zero
    /// dimension and only finite components.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Empty` for an empty map,
    /// `EmbeddingError::DimensionMismatch` when lengths differ and
    /// `EmbeddingError::MalformedArtifact` for zero-length or non-finite vectors.
    pub fn new(vectors: IndexMap<String, Vec<f32>>) -> EmbeddingResult<Self> {
        let dimension = match vectors.values().next() {
            Some(first) => first.len(),
            None => return Err(EmbeddingError::Empty),
        };

        if dimension == 0 {
            return Err(EmbeddingError::MalformedArtifact(
                "vectors must have at least one component".to_string(),
            ));
        }

        for (id, vector) in &vectors {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    id: id.clone(),
                    expected: dimension,
                    found: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(EmbeddingError::MalformedArtifact(format!(
                    "vector for '{}' contains a non-finite component",
                    id
                )));
            }
        }

        Ok(Self { vectors, dimension })
    }

    /// Parse a JSON artifact of the form `{ "<id>": [f32, ...], ... }`.
    pub fn from_json_slice(bytes: &[u8]) -> EmbeddingResult<Self> {
        let vectors: IndexMap<String, Vec<f32>> = serde_json::from_slice(bytes)
            .map_err(|e| EmbeddingError::MalformedArtifact(e.to_string()))?;
        Self::new(vectors)
    }

    /// Load a JSON artifact from disk.
    ///
    /// # Errors
    /// Returns `EmbeddingError::ArtifactUnavailable` if the file cannot be
    /// read, or any validation error from [`EmbeddingTable::new`].
    pub fn load(path: &Path) -> EmbeddingResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            EmbeddingError::ArtifactUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let table = Self::from_json_slice(&bytes)?;
        info!(
            "Loaded {} embeddings (dimension {}) from {}",
            table.len(),
            table.dimension(),
            path.display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id)
    }

    /// Look up the vector for an item.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    /// Look up the vector for an item, failing with `UnknownItem`.
    pub fn vector(&self, id: &str) -> EmbeddingResult<&[f32]> {
        self.get(id)
            .ok_or_else(|| EmbeddingError::UnknownItem(id.to_string()))
    }

    /// Iterate entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.vectors.iter().map(|(id, v)| (id.as_str(), v.as_slice()))
    }

    /// Rank every entry of the table by ascending cosine distance to `query`.
    ///
    /// # Panics
    /// Panics if `query` does not have the table's dimension.
    pub fn rank_by_distance(&self, query: &[f32]) -> Vec<Neighbour> {
        assert_eq!(query.len(), self.dimension, "Query must match table dimension");

        let mut ranked: Vec<Neighbour> = self
            .iter()
            .map(|(id, vector)| Neighbour {
                id: id.to_string(),
                distance: cosine_distance(query, vector),
            })
            .collect();

        // sort_by is stable: equal distances stay in table order
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        ranked
    }

    /// The `n` nearest entries to an item already in the table.
    ///
    /// The anchor itself is part of the ranking (normally at distance 0), so
    /// callers that want strict neighbours should ask for one extra entry and
    /// drop the anchor.
    ///
    /// # Errors
    /// Returns `EmbeddingError::UnknownItem` if `id` is not in the table.
    pub fn nearest_neighbours(&self, id: &str, n: usize) -> EmbeddingResult<Vec<Neighbour>> {
        let anchor = self.vector(id)?;
        let mut ranked = self.rank_by_distance(anchor);
        ranked.truncate(n);
        Ok(ranked)
    }
}

/// Cosine distance (`1 - cosine similarity`) between two vectors.
///
/// Products are accumulated in `f64`. A zero-magnitude vector has similarity
/// 0 with everything, i.e. distance 1.
///
/// # Panics
/// Panics if the vectors have different lengths.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Normalizes text for comparisons and deduplication.
///
/// Lowercases, trims and collapses runs of whitespace to a single space.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, Vec<f32>)]) -> EmbeddingTable {
        let map: IndexMap<String, Vec<f32>> = entries
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect();
        EmbeddingTable::new(map).unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Hello World"), "hello world");
        assert_eq!(normalize_text("  Multiple   Spaces  "), "multiple spaces");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
        assert!((cosine_distance(&[0.0, 0.0], &[1.0, 1.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_empty_table() {
        let result = EmbeddingTable::new(IndexMap::new());
        assert!(matches!(result, Err(EmbeddingError::Empty)));
    }

    #[test]
    fn test_rejects_mixed_dimensions() {
        let json = br#"{"a": [1.0, 0.0], "b": [1.0, 0.0, 0.0]}"#;
        match EmbeddingTable::from_json_slice(json) {
            Err(EmbeddingError::DimensionMismatch { id, expected, found }) => {
                assert_eq!(id, "b");
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("Expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = EmbeddingTable::from_json_slice(b"[1, 2, 3]");
        assert!(matches!(result, Err(EmbeddingError::MalformedArtifact(_))));
    }

    #[test]
    fn test_json_preserves_file_order() {
        let json = br#"{"z": [1.0], "a": [2.0], "m": [3.0]}"#;
        let table = EmbeddingTable::from_json_slice(json).unwrap();
        let ids: Vec<&str> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(table.dimension(), 1);
    }

    #[test]
    fn test_nearest_neighbours_includes_anchor_first() {
        let table = table(&[
            ("X", vec![1.0, 0.0]),
            ("Y", vec![0.0, 1.0]),
            ("Z", vec![0.9, 0.1]),
        ]);
        let neighbours = table.nearest_neighbours("X", 2).unwrap();
        let ids: Vec<&str> = neighbours.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["X", "Z"]);
        assert!(neighbours[0].distance.abs() < 1e-9);
    }

    #[test]
    fn test_nearest_neighbours_unknown_item() {
        let table = table(&[("X", vec![1.0, 0.0])]);
        let result = table.nearest_neighbours("missing", 3);
        assert!(matches!(result, Err(EmbeddingError::UnknownItem(id)) if id == "missing"));
    }

    #[test]
    fn test_ranking_ties_keep_table_order() {
        let table = table(&[
            ("b", vec![0.0, 1.0]),
            ("a", vec![0.0, 2.0]),
            ("c", vec![1.0, 0.0]),
        ]);
        let ranked = table.rank_by_distance(&[0.0, 1.0]);
        let ids: Vec<&str> = ranked.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        std::fs::write(&path, br#"{"p1": [0.5, 0.5], "p2": [1.0, 0.0]}"#).unwrap();

        let table = EmbeddingTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.contains("p2"));

        let missing = EmbeddingTable::load(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(EmbeddingError::ArtifactUnavailable(_))));
    }
}
