//! Ranked multi-field search over the catalog.
//!
//! A search runs four independent predicates (tag, author, venue and year),
//! each capped at the page limit, concatenates the hits and ranks texts by
//! how many predicates they matched. Ties keep the order in which texts
//! first appeared in the concatenated list.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use citation_network::search::{RankedSearchEngine, SearchEngine, SearchFilters, SearchQuery};
//! use citation_network::storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(SqliteStorage::open("catalog.db")?);
//! let engine = RankedSearchEngine::new(storage);
//!
//! let filters = SearchFilters {
//!     author: Some("Geoffrey Hinton".to_string()),
//!     year: Some("2012".to_string()),
//!     ..SearchFilters::default()
//! };
//! for hit in engine.search(&SearchQuery::new(filters, None)).await? {
//!     println!("{} ({} matches)", hit.text.title, hit.match_count);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::Text;
use crate::storage::{CatalogStorage, StorageError};

/// Venue fragment used when no venue filter is given. No real venue name
/// contains it, so the venue predicate contributes nothing.
pub const UNSET_VENUE_SENTINEL: &str = "<!?*>";

/// Default number of raw hits taken from each predicate.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Errors that can occur during search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Storage access failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Filters as they arrive from a client. Every field is optional.
///
/// `year` stays a string so that malformed input can be told apart from
/// an unset filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFilters {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

impl SearchFilters {
    /// Resolve the year filter.
    ///
    /// Only a missing or exactly empty year counts as unset (year 0). A
    /// supplied value is trimmed and must be an integer; integers outside
    /// the storable range match nothing without affecting other filters.
    pub fn year_filter(&self) -> YearFilter {
        let raw = match self.year.as_deref() {
            None | Some("") => return YearFilter::Year(0),
            Some(raw) => raw.trim(),
        };

        match raw.parse::<i64>() {
            Ok(year) => i32::try_from(year).map_or(YearFilter::OutOfRange, YearFilter::Year),
            Err(_) if is_integer_literal(raw) => YearFilter::OutOfRange,
            Err(_) => YearFilter::Malformed,
        }
    }

    /// Venue fragment to match, with the sentinel standing in for unset.
    pub fn venue_fragment(&self) -> &str {
        match self.venue_name.as_deref() {
            None | Some("") => UNSET_VENUE_SENTINEL,
            Some(venue) => venue,
        }
    }
}

/// Resolved `year` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearFilter {
    /// Match texts published in this year
    Year(i32),

    /// An integer no stored year can equal; the predicate contributes nothing
    OutOfRange,

    /// Not an integer; the whole search yields nothing
    Malformed,
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(&['+', '-'][..]).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Search query parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub filters: SearchFilters,

    /// Maximum number of raw hits per predicate
    pub page_limit: usize,
}

impl SearchQuery {
    /// Create a new search query.
    ///
    /// # Arguments
    /// * `filters` - The client filters
    /// * `page_limit` - Raw hits per predicate (default: 20)
    pub fn new(filters: SearchFilters, page_limit: Option<usize>) -> Self {
        Self {
            filters,
            page_limit: page_limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub text: Text,

    /// Number of predicates the text matched
    pub match_count: usize,
}

/// Trait for search engines.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search and return hits by descending match count.
    ///
    /// # Errors
    /// Returns `SearchError` if a storage call fails. A malformed year is
    /// not an error; it yields an empty list.
    async fn search(&self, query: &SearchQuery) -> SearchResult<Vec<SearchHit>>;
}

/// Rank texts by how often they occur across predicate hit lists.
///
/// Texts with equal counts keep their first-appearance order.
pub fn rank_by_match_count(hits: Vec<Text>) -> Vec<SearchHit> {
    let mut counts: IndexMap<Uuid, SearchHit> = IndexMap::new();
    for text in hits {
        counts
            .entry(text.id)
            .and_modify(|hit| hit.match_count += 1)
            .or_insert(SearchHit {
                text,
                match_count: 1,
            });
    }

    let mut ranked: Vec<SearchHit> = counts.into_values().collect();
    // stable sort keeps first-appearance order for ties
    ranked.sort_by(|a, b| b.match_count.cmp(&a.match_count));
    ranked
}

/// Search engine running the four catalog predicates against storage.
pub struct RankedSearchEngine<S>
where
    S: CatalogStorage,
{
    storage: Arc<S>,
}

impl<S> RankedSearchEngine<S>
where
    S: CatalogStorage,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S> SearchEngine for RankedSearchEngine<S>
where
    S: CatalogStorage,
{
    async fn search(&self, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        let filters = &query.filters;
        let limit = query.page_limit;

        let year = match filters.year_filter() {
            YearFilter::Malformed => {
                debug!("Unparseable year {:?}, returning no results", filters.year);
                return Ok(Vec::new());
            }
            year => year,
        };

        let tag = filters.tag.as_deref().unwrap_or("");
        let author = filters.author.as_deref().unwrap_or("");

        let mut hits = self.storage.texts_with_tag(tag, limit).await?;
        hits.extend(self.storage.texts_by_author(author, limit).await?);
        hits.extend(
            self.storage
                .texts_with_venue_containing(filters.venue_fragment(), limit)
                .await?,
        );
        if let YearFilter::Year(year) = year {
            hits.extend(self.storage.texts_from_year(year, limit).await?);
        }

        debug!("Search collected {} raw hits", hits.len());
        Ok(rank_by_match_count(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, AuthorInput, Authorship, Citation, Named, NewText, User};
    use crate::storage::StorageResult;

    fn text(title: &str, year: i32, venue: &str, tags: &[&str], authors: &[&str]) -> Text {
        Text {
            id: Uuid::new_v4(),
            title: title.to_string(),
            year: Some(year),
            n_citation: 0,
            abstract_text: String::new(),
            venue_name: venue.to_string(),
            keywords: Vec::new(),
            authors: authors
                .iter()
                .map(|name| Author {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    orgs: Vec::new(),
                })
                .collect(),
            fos: Vec::new(),
            tags: tags
                .iter()
                .map(|name| Named {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    // Mock storage implementing only the search predicates
    struct MockStorage {
        texts: Vec<Text>,
        should_fail: bool,
    }

    impl MockStorage {
        fn new(texts: Vec<Text>) -> Self {
            Self {
                texts,
                should_fail: false,
            }
        }

        fn with_failure() -> Self {
            Self {
                texts: Vec::new(),
                should_fail: true,
            }
        }

        fn filter(&self, limit: usize, pred: impl Fn(&Text) -> bool) -> StorageResult<Vec<Text>> {
            if self.should_fail {
                return Err(StorageError::QueryError("Mock storage failure".to_string()));
            }
            Ok(self.texts.iter().filter(|t| pred(t)).take(limit).cloned().collect())
        }
    }

    #[async_trait]
    impl CatalogStorage for MockStorage {
        async fn initialize(&self) -> StorageResult<()> {
            Ok(())
        }

        async fn insert_text(&self, _text: &NewText) -> StorageResult<Text> {
            unimplemented!()
        }

        async fn get_text(&self, id: Uuid) -> StorageResult<Text> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn list_texts(&self, _skip: usize, _limit: usize) -> StorageResult<Vec<Text>> {
            Ok(self.texts.clone())
        }

        async fn delete_text(&self, id: Uuid) -> StorageResult<Text> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn count_texts(&self) -> StorageResult<usize> {
            Ok(self.texts.len())
        }

        async fn exists_by_title(&self, _normalized_title: &str) -> StorageResult<bool> {
            Ok(false)
        }

        async fn texts_with_tag(&self, tag: &str, limit: usize) -> StorageResult<Vec<Text>> {
            self.filter(limit, |t| t.tags.iter().any(|g| g.name == tag))
        }

        async fn texts_by_author(&self, author: &str, limit: usize) -> StorageResult<Vec<Text>> {
            self.filter(limit, |t| t.authors.iter().any(|a| a.name == author))
        }

        async fn texts_with_venue_containing(
            &self,
            fragment: &str,
            limit: usize,
        ) -> StorageResult<Vec<Text>> {
            self.filter(limit, |t| t.venue_name.contains(fragment))
        }

        async fn texts_from_year(&self, year: i32, limit: usize) -> StorageResult<Vec<Text>> {
            self.filter(limit, |t| t.year == Some(year))
        }

        async fn insert_author(&self, _author: &AuthorInput) -> StorageResult<Author> {
            unimplemented!()
        }

        async fn get_author(&self, id: Uuid) -> StorageResult<Author> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn list_authors(&self, _skip: usize, _limit: usize) -> StorageResult<Vec<Author>> {
            Ok(Vec::new())
        }

        async fn update_author(&self, id: Uuid, _author: &AuthorInput) -> StorageResult<Author> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn delete_author(&self, id: Uuid) -> StorageResult<Author> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn insert_citation(&self, citation: &Citation) -> StorageResult<Citation> {
            Ok(*citation)
        }

        async fn insert_user(&self, user: &User) -> StorageResult<User> {
            Ok(user.clone())
        }

        async fn get_user_by_login(&self, _login: &str) -> StorageResult<Option<User>> {
            Ok(None)
        }

        async fn get_user_by_id(&self, _id: Uuid) -> StorageResult<Option<User>> {
            Ok(None)
        }

        async fn update_password_hash(&self, id: Uuid, _hash: &str) -> StorageResult<User> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn authorship(&self, _limit: Option<usize>) -> StorageResult<Vec<Authorship>> {
            Ok(Vec::new())
        }
    }

    fn engine(texts: Vec<Text>) -> RankedSearchEngine<MockStorage> {
        RankedSearchEngine::new(Arc::new(MockStorage::new(texts)))
    }

    fn titles(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.text.title.as_str()).collect()
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::new(SearchFilters::default(), None);
        assert_eq!(query.page_limit, 20);
    }

    #[test]
    fn test_filter_resolution() {
        let mut filters = SearchFilters::default();
        assert_eq!(filters.year_filter(), YearFilter::Year(0));
        assert_eq!(filters.venue_fragment(), UNSET_VENUE_SENTINEL);

        filters.year = Some(" 2019 ".to_string());
        filters.venue_name = Some(String::new());
        assert_eq!(filters.year_filter(), YearFilter::Year(2019));
        assert_eq!(filters.venue_fragment(), UNSET_VENUE_SENTINEL);

        filters.year = Some("abc".to_string());
        assert_eq!(filters.year_filter(), YearFilter::Malformed);

        filters.year = Some("   ".to_string());
        assert_eq!(filters.year_filter(), YearFilter::Malformed);

        filters.year = Some(String::new());
        assert_eq!(filters.year_filter(), YearFilter::Year(0));

        filters.year = Some("99999999999".to_string());
        assert_eq!(filters.year_filter(), YearFilter::OutOfRange);

        filters.year = Some("-123456789012345678901234567890".to_string());
        assert_eq!(filters.year_filter(), YearFilter::OutOfRange);
    }

    #[test]
    fn test_rank_by_match_count_ties_keep_first_appearance() {
        let a = text("A", 2020, "", &[], &[]);
        let b = text("B", 2020, "", &[], &[]);
        let c = text("C", 2020, "", &[], &[]);
        let hits = vec![b.clone(), a.clone(), c.clone(), a.clone()];

        let ranked = rank_by_match_count(hits);
        assert_eq!(titles(&ranked), vec!["A", "B", "C"]);
        assert_eq!(ranked[0].match_count, 2);
        assert_eq!(ranked[1].match_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_year_returns_empty() {
        let engine = engine(vec![text("A", 2020, "KDD", &["ml"], &["Ann"])]);
        let filters = SearchFilters {
            tag: Some("ml".to_string()),
            year: Some("abc".to_string()),
            ..SearchFilters::default()
        };
        let hits = engine.search(&SearchQuery::new(filters, None)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_year_returns_empty() {
        let engine = engine(vec![text("A", 2020, "KDD", &["ml"], &["Ann"])]);
        let filters = SearchFilters {
            tag: Some("ml".to_string()),
            year: Some("   ".to_string()),
            ..SearchFilters::default()
        };
        let hits = engine.search(&SearchQuery::new(filters, None)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_year_keeps_other_filters() {
        let engine = engine(vec![
            text("Tagged", 2020, "KDD", &["ml"], &["Ann"]),
            text("Other", 2020, "KDD", &["nlp"], &["Bob"]),
        ]);
        let filters = SearchFilters {
            tag: Some("ml".to_string()),
            year: Some("99999999999".to_string()),
            ..SearchFilters::default()
        };
        let hits = engine.search(&SearchQuery::new(filters, None)).await.unwrap();
        assert_eq!(titles(&hits), vec!["Tagged"]);
        assert_eq!(hits[0].match_count, 1);
    }

    #[tokio::test]
    async fn test_all_empty_filters_are_well_defined() {
        let engine = engine(vec![text("A", 2020, "KDD", &["ml"], &["Ann"])]);
        let hits = engine
            .search(&SearchQuery::new(SearchFilters::default(), None))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_double_match_ranks_first() {
        let engine = engine(vec![
            text("Tag only", 2018, "ICML", &["ml"], &["Bob"]),
            text("Tag and author", 2019, "ICML", &["ml"], &["Ann"]),
            text("Author only", 2020, "ICML", &["nlp"], &["Ann"]),
        ]);
        let filters = SearchFilters {
            tag: Some("ml".to_string()),
            author: Some("Ann".to_string()),
            ..SearchFilters::default()
        };
        let hits = engine.search(&SearchQuery::new(filters, None)).await.unwrap();
        assert_eq!(titles(&hits), vec!["Tag and author", "Tag only", "Author only"]);
        assert_eq!(hits[0].match_count, 2);
    }

    #[tokio::test]
    async fn test_all_four_predicates_contribute() {
        let engine = engine(vec![
            text("Everything", 2021, "Proceedings of KDD", &["graphs"], &["Ann"]),
            text("Venue only", 2010, "KDD Workshops", &[], &[]),
            text("Year only", 2021, "ACL", &[], &[]),
        ]);
        let filters = SearchFilters {
            tag: Some("graphs".to_string()),
            author: Some("Ann".to_string()),
            venue_name: Some("KDD".to_string()),
            year: Some("2021".to_string()),
        };
        let hits = engine.search(&SearchQuery::new(filters, None)).await.unwrap();
        assert_eq!(titles(&hits), vec!["Everything", "Venue only", "Year only"]);
        assert_eq!(hits[0].match_count, 4);
    }

    #[tokio::test]
    async fn test_page_limit_caps_each_predicate() {
        let texts: Vec<Text> = (0..5)
            .map(|i| text(&format!("T{}", i), 2000, "", &["ml"], &[]))
            .collect();
        let engine = engine(texts);
        let filters = SearchFilters {
            tag: Some("ml".to_string()),
            ..SearchFilters::default()
        };
        let hits = engine.search(&SearchQuery::new(filters, Some(3))).await.unwrap();
        assert_eq!(titles(&hits), vec!["T0", "T1", "T2"]);
    }

    #[tokio::test]
    async fn test_storage_error_propagation() {
        let engine = RankedSearchEngine::new(Arc::new(MockStorage::with_failure()));
        let result = engine
            .search(&SearchQuery::new(SearchFilters::default(), None))
            .await;
        assert!(matches!(result, Err(SearchError::StorageError(_))));
    }
}
