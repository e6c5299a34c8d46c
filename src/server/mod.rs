//! HTTP server module.
//!
//! Two axum services are exposed: the catalog API ([`api`]) and the
//! recommender service ([`recsys`]). This module holds what they share:
//! configuration, the JSON error type and the serve loop.

pub mod api;
pub mod recsys;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::auth::AuthError;
use crate::classifier::ClassifierError;
use crate::graph::GraphError;
use crate::recommend::RecommendError;
use crate::search::{SearchError, DEFAULT_PAGE_LIMIT};
use crate::storage::StorageError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested record or item doesn't exist
    #[error("{0}")]
    NotFound(String),

    /// The request violates a catalog or account rule
    #[error("{0}")]
    BadRequest(String),

    /// A backing component is not loaded or not configured
    #[error("{0}")]
    NotReady(String),

    /// Other unexpected errors
    #[error("{0}")]
    Internal(String),
}

/// Result type for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body returned on error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => ApiError::NotFound(format!("{} not found", msg)),
            StorageError::DuplicateEntry(msg) | StorageError::InvalidInput(msg) => {
                ApiError::BadRequest(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::StorageError(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Storage(e) => e.into(),
            AuthError::MalformedHash(_) | AuthError::Hashing(_) => ApiError::Internal(e.to_string()),
            AuthError::LoginTaken(_)
            | AuthError::UnknownLogin(_)
            | AuthError::InvalidPassword
            | AuthError::UnknownUser(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(e: ClassifierError) -> Self {
        match e {
            ClassifierError::Unavailable | ClassifierError::RequestFailed(_) => {
                ApiError::NotReady(e.to_string())
            }
            ClassifierError::InvalidResponse(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> Self {
        match e {
            RecommendError::UnknownItem(_) => ApiError::NotFound(e.to_string()),
            RecommendError::InvalidCount => ApiError::BadRequest(e.to_string()),
            RecommendError::ColdStartTooShort { .. } | RecommendError::Embedding(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::UnknownVertex(_) => ApiError::NotFound(e.to_string()),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Raw hits per search predicate
    pub search_page_limit: usize,

    /// Neighbours returned by the recommender
    pub neighbor_count: usize,

    /// Timeout for outbound requests (classifier) in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            search_page_limit: DEFAULT_PAGE_LIMIT,
            neighbor_count: crate::recommend::DEFAULT_NEIGHBOR_COUNT,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bind the configured address and serve `app` until Ctrl-C.
///
/// # Errors
/// Returns an I/O error if the listener cannot be bound or serving fails
pub async fn serve(app: Router, config: &ServerConfig) -> std::io::Result<()> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let not_found: ApiError = StorageError::NotFound("Text 1".to_string()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let duplicate: ApiError = StorageError::DuplicateEntry("dup".to_string()).into();
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

        let query: ApiError = StorageError::QueryError("boom".to_string()).into();
        assert_eq!(query.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_component_error_mapping() {
        let unknown: ApiError = RecommendError::UnknownItem("x".to_string()).into();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let no_classifier: ApiError = ClassifierError::Unavailable.into();
        assert_eq!(no_classifier.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad_password: ApiError = AuthError::InvalidPassword.into();
        assert_eq!(bad_password.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::NotFound("Text 1 not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.error, "Text 1 not found");
        assert_eq!(parsed.code, 404);
    }

    #[test]
    fn test_config_addr() {
        let config = ServerConfig {
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:9000");
    }
}
