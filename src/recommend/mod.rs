//! Weighted-history neighbour recommendations.
//!
//! Given the items a user has viewed (oldest first), the recommender picks
//! one of three strategies:
//!
//! - **no history**: a curated cold-start list;
//! - **one item**: the item's own nearest neighbours, skipping the item;
//! - **several items**: a log-decayed weighted average of the item vectors
//!   (recent items weigh more), followed by a full scan of the table for the
//!   closest unseen items.
//!
//! # Example
//!
//! ```ignore
//! let table = EmbeddingTable::load(Path::new("articles.json"))?;
//! let recommender = Recommender::new(table, RecommenderConfig::default());
//! let neighbors = recommender.recommend(&["53e9986eb7602d97020ab93b".to_string()], 5)?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::embedding::{EmbeddingError, EmbeddingTable};

/// Curated items returned when there is no history to work from.
pub const DEFAULT_COLD_START: [&str; 5] = [
    "53e9986eb7602d97020ab93b",
    "53e9b587b7602d97040c7931",
    "53e9bb52b7602d9704790954",
    "53e9a95db7602d97032b5715",
    "53e9983db7602d9702065035",
];

/// Default number of neighbours returned per request.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 5;

/// Errors that can occur while computing recommendations.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// A history entry is not in the embedding table
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// The requested neighbour count is zero
    #[error("Neighbour count must be positive")]
    InvalidCount,

    /// The cold-start list cannot fill a full response
    #[error("Cold-start list has {available} items, {requested} required")]
    ColdStartTooShort { available: usize, requested: usize },

    /// Any other embedding table failure
    #[error(transparent)]
    Embedding(EmbeddingError),
}

impl From<EmbeddingError> for RecommendError {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::UnknownItem(id) => RecommendError::UnknownItem(id),
            other => RecommendError::Embedding(other),
        }
    }
}

/// Result type for recommendation operations.
pub type RecommendResult<T> = Result<T, RecommendError>;

/// Recommender settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderConfig {
    /// Items returned for an empty history, in order
    pub cold_start: Vec<String>,
}

impl RecommenderConfig {
    /// Check that every response can carry `k` items.
    ///
    /// # Errors
    /// Returns `RecommendError::InvalidCount` when `k` is zero and
    /// `RecommendError::ColdStartTooShort` when the cold-start list has
    /// fewer than `k` items
    pub fn validate(&self, k: usize) -> RecommendResult<()> {
        if k == 0 {
            return Err(RecommendError::InvalidCount);
        }
        if self.cold_start.len() < k {
            return Err(RecommendError::ColdStartTooShort {
                available: self.cold_start.len(),
                requested: k,
            });
        }
        Ok(())
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            cold_start: DEFAULT_COLD_START.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Recommendation service over an immutable embedding table.
///
/// Cloning is cheap; clones share the same table.
#[derive(Debug, Clone)]
pub struct Recommender {
    table: Arc<EmbeddingTable>,
    config: RecommenderConfig,
}

impl Recommender {
    pub fn new(table: EmbeddingTable, config: RecommenderConfig) -> Self {
        Self {
            table: Arc::new(table),
            config,
        }
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Recommend up to `k` items for a chronologically ordered history.
    ///
    /// # Arguments
    /// * `history` - Previously viewed item IDs, oldest first
    /// * `k` - Number of items to return
    ///
    /// # Errors
    /// Returns `RecommendError::InvalidCount` when `k` is zero and
    /// `RecommendError::UnknownItem` when any history entry is missing from
    /// the table.
    pub fn recommend(&self, history: &[String], k: usize) -> RecommendResult<Vec<String>> {
        if k == 0 {
            return Err(RecommendError::InvalidCount);
        }

        match history {
            [] => {
                debug!("Cold start: returning curated list");
                Ok(self.config.cold_start.iter().take(k).cloned().collect())
            }
            [anchor] => self.similar_items(anchor, k),
            _ => self.weighted_history(history, k),
        }
    }

    /// Strict neighbours of a single item.
    fn similar_items(&self, anchor: &str, k: usize) -> RecommendResult<Vec<String>> {
        debug!("Similarity query for {}", anchor);

        // The anchor ranks as its own nearest neighbour, hence k + 1
        let neighbours = self.table.nearest_neighbours(anchor, k + 1)?;

        Ok(neighbours
            .into_iter()
            .filter(|n| n.id != anchor)
            .take(k)
            .map(|n| n.id)
            .collect())
    }

    /// Closest unseen items to the weighted average of the history.
    fn weighted_history(&self, history: &[String], k: usize) -> RecommendResult<Vec<String>> {
        debug!("Weighted history query over {} items", history.len());

        let vectors = history
            .iter()
            .map(|id| self.table.vector(id))
            .collect::<Result<Vec<_>, _>>()?;

        let weights = history_weights(history.len());
        let mean = weighted_mean(&vectors, &weights);

        let seen: HashSet<&str> = history.iter().map(String::as_str).collect();

        Ok(self
            .table
            .rank_by_distance(&mean)
            .into_iter()
            .filter(|n| !seen.contains(n.id.as_str()))
            .take(k)
            .map(|n| n.id)
            .collect())
    }
}

/// Normalized log-decay weights for a history of length `n`, oldest first.
///
/// The item `i` positions from the end (0 = most recent) gets
/// `1 / ln(i + 2)` before normalization, so weights grow towards the newest
/// entry and sum to 1.
pub fn history_weights(n: usize) -> Vec<f64> {
    let mut weights: Vec<f64> = (0..n)
        .map(|position| {
            let from_end = (n - 1 - position) as f64;
            1.0 / (from_end + 2.0).ln()
        })
        .collect();

    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in &mut weights {
            *w /= total;
        }
    }
    weights
}

/// Weighted average of equally sized vectors.
///
/// # Panics
/// Panics if `vectors` and `weights` differ in length or `vectors` is empty.
pub fn weighted_mean(vectors: &[&[f32]], weights: &[f64]) -> Vec<f32> {
    assert_eq!(vectors.len(), weights.len(), "One weight per vector");
    assert!(!vectors.is_empty(), "Need at least one vector");

    let dimension = vectors[0].len();
    let mut acc = vec![0.0f64; dimension];
    for (vector, &weight) in vectors.iter().zip(weights) {
        for (slot, &x) in acc.iter_mut().zip(vector.iter()) {
            *slot += weight * f64::from(x);
        }
    }

    let total: f64 = weights.iter().sum();
    acc.into_iter().map(|x| (x / total) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn recommender(entries: &[(&str, Vec<f32>)]) -> Recommender {
        let map: IndexMap<String, Vec<f32>> = entries
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect();
        Recommender::new(EmbeddingTable::new(map).unwrap(), RecommenderConfig::default())
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Recommender {
        recommender(&[
            ("a", vec![1.0, 0.0, 0.0]),
            ("b", vec![0.9, 0.1, 0.0]),
            ("c", vec![0.0, 1.0, 0.0]),
            ("d", vec![0.1, 0.9, 0.0]),
            ("e", vec![0.0, 0.0, 1.0]),
            ("f", vec![0.5, 0.5, 0.0]),
        ])
    }

    #[test]
    fn test_cold_start_returns_curated_list_in_order() {
        let rec = sample();
        let result = rec.recommend(&[], 5).unwrap();
        assert_eq!(result, ids(&DEFAULT_COLD_START));

        // Stable across calls
        assert_eq!(rec.recommend(&[], 5).unwrap(), result);
    }

    #[test]
    fn test_cold_start_list_is_configurable() {
        let map: IndexMap<String, Vec<f32>> =
            [("x".to_string(), vec![1.0])].into_iter().collect();
        let config = RecommenderConfig {
            cold_start: ids(&["p", "q", "r"]),
        };
        let rec = Recommender::new(EmbeddingTable::new(map).unwrap(), config);
        assert_eq!(rec.recommend(&[], 2).unwrap(), ids(&["p", "q"]));
    }

    #[test]
    fn test_single_item_example() {
        let rec = recommender(&[
            ("X", vec![1.0, 0.0]),
            ("Y", vec![0.0, 1.0]),
            ("Z", vec![0.9, 0.1]),
        ]);
        let result = rec.recommend(&ids(&["X"]), 1).unwrap();
        assert_eq!(result, ids(&["Z"]));
    }

    #[test]
    fn test_single_item_never_returns_itself() {
        let rec = sample();
        for anchor in ["a", "b", "c", "d", "e", "f"] {
            let result = rec.recommend(&ids(&[anchor]), 5).unwrap();
            assert_eq!(result.len(), 5);
            assert!(!result.iter().any(|id| id == anchor));
        }
    }

    #[test]
    fn test_single_item_with_duplicate_vector_still_skips_anchor() {
        // "twin" sits at distance 0 from "a" and precedes it in table order
        let rec = recommender(&[
            ("twin", vec![1.0, 0.0]),
            ("a", vec![1.0, 0.0]),
            ("far", vec![0.0, 1.0]),
        ]);
        let result = rec.recommend(&ids(&["a"]), 2).unwrap();
        assert_eq!(result, ids(&["twin", "far"]));
    }

    #[test]
    fn test_single_item_small_table_returns_fewer() {
        let rec = recommender(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let result = rec.recommend(&ids(&["a"]), 5).unwrap();
        assert_eq!(result, ids(&["b"]));
    }

    #[test]
    fn test_multi_item_excludes_history() {
        let rec = sample();
        let history = ids(&["a", "c", "f"]);
        let result = rec.recommend(&history, 3).unwrap();
        assert_eq!(result.len(), 3);
        for id in &result {
            assert!(!history.contains(id), "{} was already seen", id);
        }
    }

    #[test]
    fn test_multi_item_favours_recent_items() {
        let rec = sample();
        // "f" sits between both axes; after it, the item near the most
        // recent entry wins
        let result = rec.recommend(&ids(&["a", "c"]), 3).unwrap();
        assert_eq!(result, ids(&["f", "d", "b"]));

        let result = rec.recommend(&ids(&["c", "a"]), 3).unwrap();
        assert_eq!(result, ids(&["f", "b", "d"]));
    }

    #[test]
    fn test_multi_item_small_table_returns_fewer() {
        let rec = recommender(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("c", vec![1.0, 1.0]),
        ]);
        let result = rec.recommend(&ids(&["a", "b"]), 5).unwrap();
        assert_eq!(result, ids(&["c"]));
    }

    #[test]
    fn test_unknown_item_fails_fast() {
        let rec = sample();
        match rec.recommend(&ids(&["missing"]), 5) {
            Err(RecommendError::UnknownItem(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected UnknownItem, got {:?}", other),
        }
        match rec.recommend(&ids(&["a", "missing", "c"]), 5) {
            Err(RecommendError::UnknownItem(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected UnknownItem, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        let rec = sample();
        assert!(matches!(rec.recommend(&[], 0), Err(RecommendError::InvalidCount)));
    }

    #[test]
    fn test_cold_start_must_cover_neighbor_count() {
        let default = RecommenderConfig::default();
        assert!(default.validate(DEFAULT_NEIGHBOR_COUNT).is_ok());
        assert!(matches!(default.validate(0), Err(RecommendError::InvalidCount)));
        match default.validate(DEFAULT_NEIGHBOR_COUNT + 1) {
            Err(RecommendError::ColdStartTooShort { available, requested }) => {
                assert_eq!(available, DEFAULT_NEIGHBOR_COUNT);
                assert_eq!(requested, DEFAULT_NEIGHBOR_COUNT + 1);
            }
            other => panic!("Expected ColdStartTooShort, got {:?}", other),
        }

        let short = RecommenderConfig {
            cold_start: ids(&["a", "b"]),
        };
        assert!(short.validate(2).is_ok());
        assert!(short.validate(3).is_err());
    }

    #[test]
    fn test_history_weights_monotonic_and_normalized() {
        let weights = history_weights(3);
        assert_eq!(weights.len(), 3);
        // oldest -> newest
        assert!(weights[2] > weights[1]);
        assert!(weights[1] > weights[0]);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let raw_newest = 1.0 / 2f64.ln();
        let raw_oldest = 1.0 / 4f64.ln();
        assert!((weights[2] / weights[0] - raw_newest / raw_oldest).abs() < 1e-9);
    }

    #[test]
    fn test_history_weights_long_history() {
        let weights = history_weights(50);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(weights.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_weighted_mean() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        let mean = weighted_mean(&[&a, &b], &[0.25, 0.75]);
        assert!((mean[0] - 0.25).abs() < 1e-6);
        assert!((mean[1] - 0.75).abs() < 1e-6);
    }
}
