//! HTTP client for the tag classification service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassifierError, ClassifierResult, TagClassifier};

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    title: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<String>,
}

/// Classifier that calls a remote `/predict_tags` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTagClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTagClassifier {
    /// Create a client for the service at `base_url`.
    ///
    /// `base_url` may be the service root or the full `/predict_tags` URL.
    ///
    /// # Errors
    /// Returns `ClassifierError::RequestFailed` if the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> ClassifierResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: predict_endpoint(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn predict_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/predict_tags") {
        base.to_string()
    } else {
        format!("{}/predict_tags", base)
    }
}

#[async_trait]
impl TagClassifier for HttpTagClassifier {
    async fn predict_tags(&self, title: &str, abstract_text: &str) -> ClassifierResult<Vec<String>> {
        debug!("Requesting tags from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&PredictRequest {
                title,
                abstract_text,
            })
            .send()
            .await
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::RequestFailed(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
        Ok(body.predictions)
    }
}
