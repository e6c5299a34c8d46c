//! HTTP endpoints for the recommender service.
//!
//! Endpoints:
//! - GET  /              - entry point
//! - GET  /info          - model name and version
//! - GET  /health        - 200 when embeddings are loaded, 503 otherwise
//! - POST /get_neighbors - recommendations for a viewing history

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, ApiResult};
use crate::recommend::Recommender;

pub const MODEL_NAME: &str = "Graph model";
pub const MODEL_VERSION: &str = "v1.0.0";

const ENTRY_POINT: &str = "It is entry point of our service. ";

/// Shared recommender state.
#[derive(Clone)]
pub struct RecsysState {
    /// `None` until the embedding table is loaded
    pub recommender: Option<Recommender>,

    /// Neighbours returned per request
    pub neighbor_count: usize,
}

impl RecsysState {
    pub fn new(recommender: Option<Recommender>, neighbor_count: usize) -> Self {
        Self {
            recommender,
            neighbor_count,
        }
    }
}

/// Build the recommender router.
pub fn router(state: RecsysState) -> Router {
    Router::new()
        .route("/", get(entry_point))
        .route("/info", get(info))
        .route("/health", get(health))
        .route("/get_neighbors", post(get_neighbors))
        .with_state(state)
}

// ── Request / Response types ────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct NeighborsRequest {
    /// Viewed item IDs, oldest first
    pub id: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NeighborsResponse {
    pub neighbors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

// ── Handlers ────────────────────────────────────────────────────────

async fn entry_point() -> Json<&'static str> {
    Json(ENTRY_POINT)
}

async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: MODEL_NAME.to_string(),
        version: MODEL_VERSION.to_string(),
    })
}

async fn health(State(state): State<RecsysState>) -> (StatusCode, Json<HealthResponse>) {
    match state.recommender {
        Some(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "loading".to_string(),
            }),
        ),
    }
}

async fn get_neighbors(
    State(state): State<RecsysState>,
    Json(req): Json<NeighborsRequest>,
) -> ApiResult<Json<NeighborsResponse>> {
    let recommender = state
        .recommender
        .as_ref()
        .ok_or_else(|| ApiError::NotReady("Embeddings are not loaded".to_string()))?;

    debug!("Recommending for a history of {} items", req.id.len());
    let neighbors = recommender.recommend(&req.id, state.neighbor_count)?;
    Ok(Json(NeighborsResponse { neighbors }))
}
