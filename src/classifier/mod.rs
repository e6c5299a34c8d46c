//! Tag classification boundary.
//!
//! The tag model itself runs as a separate service. This module defines the
//! interface used to ask it for tags and the "add text" step that attaches
//! predicted tags before a text is stored.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::models::{NamedInput, NewText};

/// Errors that can occur while classifying a text.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No classifier is configured
    #[error("Tag classifier is not configured")]
    Unavailable,

    /// Network or HTTP-level failure
    #[error("Classifier request failed: {0}")]
    RequestFailed(String),

    /// The response did not have the expected shape
    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),
}

/// Result type for classifier operations.
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Trait for tag classifiers.
#[async_trait]
pub trait TagClassifier: Send + Sync {
    /// Predict tag names for a text.
    ///
    /// # Arguments
    /// * `title` - Text title
    /// * `abstract_text` - Text abstract
    async fn predict_tags(&self, title: &str, abstract_text: &str) -> ClassifierResult<Vec<String>>;
}

/// Append predicted tags to a text, skipping names it already carries.
pub async fn classify_text<C>(classifier: &C, mut text: NewText) -> ClassifierResult<NewText>
where
    C: TagClassifier + ?Sized,
{
    let predictions = classifier
        .predict_tags(&text.title, &text.abstract_text)
        .await?;
    debug!("Classifier predicted {} tags for '{}'", predictions.len(), text.title);

    for name in predictions {
        if !text.tags.iter().any(|tag| tag.name == name) {
            text.tags.push(NamedInput::new(name));
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockClassifier {
        tags: Vec<&'static str>,
        should_fail: bool,
    }

    #[async_trait]
    impl TagClassifier for MockClassifier {
        async fn predict_tags(&self, _title: &str, _abstract: &str) -> ClassifierResult<Vec<String>> {
            if self.should_fail {
                return Err(ClassifierError::RequestFailed("Mock failure".to_string()));
            }
            Ok(self.tags.iter().map(|t| t.to_string()).collect())
        }
    }

    #[tokio::test]
    async fn test_classify_appends_new_tags_once() {
        let classifier = MockClassifier {
            tags: vec!["ml", "graphs", "ml"],
            should_fail: false,
        };
        let text = NewText {
            title: "Node2Vec".to_string(),
            tags: vec![NamedInput::new("graphs")],
            ..NewText::default()
        };

        let tagged = classify_text(&classifier, text).await.unwrap();
        let names: Vec<&str> = tagged.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["graphs", "ml"]);
    }

    #[tokio::test]
    async fn test_classify_propagates_failure() {
        let classifier = MockClassifier {
            tags: Vec::new(),
            should_fail: true,
        };
        let result = classify_text(&classifier, NewText::default()).await;
        assert!(matches!(result, Err(ClassifierError::RequestFailed(_))));
    }
}
