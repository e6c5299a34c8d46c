//! HTTP endpoints for the catalog API.
//!
//! Endpoints:
//! - POST   /users/registration/   - register a user
//! - GET    /users/get_user/       - user by login
//! - POST   /users/login_user/     - check credentials
//! - PUT    /users/change_password - replace a password
//! - GET/POST/PUT/DELETE /author/  - single author
//! - GET    /authors/              - paginated authors
//! - GET/POST/DELETE /text/        - single text
//! - GET    /texts/                - paginated texts
//! - POST   /text/add/             - create a text with predicted tags
//! - POST   /citation/             - record a citation
//! - GET    /search/               - ranked multi-field search
//! - GET    /graph/                - co-authorship graph as JSON or HTML
//! - GET    /health                - health check

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, ApiResult, ServerConfig};
use crate::auth::{AuthError, AuthService, ChangePasswordRequest, LoginRequest, PasswordHasher};
use crate::classifier::{classify_text, ClassifierError, TagClassifier};
use crate::graph::{CoauthorGraph, EdgeKind, DEFAULT_MAX_DEPTH};
use crate::models::{Author, AuthorInput, Citation, NewText, Text, User, UserRegistration};
use crate::search::{RankedSearchEngine, SearchEngine, SearchFilters, SearchHit, SearchQuery};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::CatalogStorage;

/// Combined application state.
#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<SqliteStorage>,
    pub search: Arc<RankedSearchEngine<SqliteStorage>>,
    pub auth: Arc<AuthService<SqliteStorage>>,

    /// Tag classifier used by `/text/add/`; unset disables that route
    pub classifier: Option<Arc<dyn TagClassifier>>,

    pub search_page_limit: usize,
}

impl ApiState {
    pub fn new(
        storage: Arc<SqliteStorage>,
        classifier: Option<Arc<dyn TagClassifier>>,
        config: &ServerConfig,
    ) -> Self {
        Self::with_hasher(storage, classifier, config, PasswordHasher::default())
    }

    pub fn with_hasher(
        storage: Arc<SqliteStorage>,
        classifier: Option<Arc<dyn TagClassifier>>,
        config: &ServerConfig,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            search: Arc::new(RankedSearchEngine::new(storage.clone())),
            auth: Arc::new(AuthService::new(storage.clone(), hasher)),
            storage,
            classifier,
            search_page_limit: config.search_page_limit,
        }
    }
}

/// Build the catalog router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/users/registration/", post(register_user))
        .route("/users/get_user/", get(get_user))
        .route("/users/login_user/", post(login_user))
        .route("/users/change_password", put(change_password))
        .route(
            "/author/",
            get(get_author)
                .post(create_author)
                .put(update_author)
                .delete(delete_author),
        )
        .route("/authors/", get(list_authors))
        .route("/text/", get(get_text).post(create_text).delete(delete_text))
        .route("/texts/", get(list_texts))
        .route("/text/add/", post(add_text))
        .route("/citation/", post(create_citation))
        .route("/search/", get(search))
        .route("/graph/", get(graph))
        .route("/health", get(health))
        .with_state(state)
}

// ── Request / Response types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthorIdQuery {
    pub author_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TextIdQuery {
    pub text_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    #[default]
    Json,
    Html,
}

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    /// Start author ID; empty or missing selects the whole graph
    pub start: Option<String>,
    pub edge_type: Option<EdgeKind>,
    pub max_depth: Option<usize>,
    pub use_weights: Option<bool>,
    pub format: Option<GraphFormat>,

    /// Only build the graph from the first `size_cut` texts (0 means all)
    pub size_cut: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub texts: usize,
}

// ── Users ───────────────────────────────────────────────────────────

async fn register_user(
    State(state): State<ApiState>,
    Json(req): Json<UserRegistration>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.auth.register_user(&req).await?))
}

async fn get_user(
    State(state): State<ApiState>,
    Query(q): Query<LoginQuery>,
) -> ApiResult<Json<User>> {
    match state.auth.get_user(&q.login).await {
        Ok(user) => Ok(Json(user)),
        Err(AuthError::UnknownLogin(login)) => {
            Err(ApiError::NotFound(format!("User '{}' not found", login)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn login_user(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.auth.login(&req).await?))
}

async fn change_password(
    State(state): State<ApiState>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.auth.change_password(&req).await?))
}

// ── Authors ─────────────────────────────────────────────────────────

async fn get_author(
    State(state): State<ApiState>,
    Query(q): Query<AuthorIdQuery>,
) -> ApiResult<Json<Author>> {
    Ok(Json(state.storage.get_author(q.author_id).await?))
}

async fn list_authors(
    State(state): State<ApiState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Author>>> {
    Ok(Json(state.storage.list_authors(page.skip, page.limit).await?))
}

async fn create_author(
    State(state): State<ApiState>,
    Json(author): Json<AuthorInput>,
) -> ApiResult<(StatusCode, Json<Author>)> {
    let author = state.storage.insert_author(&author).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

async fn update_author(
    State(state): State<ApiState>,
    Query(q): Query<AuthorIdQuery>,
    Json(author): Json<AuthorInput>,
) -> ApiResult<Json<Author>> {
    Ok(Json(state.storage.update_author(q.author_id, &author).await?))
}

async fn delete_author(
    State(state): State<ApiState>,
    Query(q): Query<AuthorIdQuery>,
) -> ApiResult<Json<Author>> {
    Ok(Json(state.storage.delete_author(q.author_id).await?))
}

// ── Texts ───────────────────────────────────────────────────────────

async fn get_text(
    State(state): State<ApiState>,
    Query(q): Query<TextIdQuery>,
) -> ApiResult<Json<Text>> {
    Ok(Json(state.storage.get_text(q.text_id).await?))
}

async fn list_texts(
    State(state): State<ApiState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Text>>> {
    Ok(Json(state.storage.list_texts(page.skip, page.limit).await?))
}

async fn create_text(
    State(state): State<ApiState>,
    Json(text): Json<NewText>,
) -> ApiResult<(StatusCode, Json<Text>)> {
    let text = state.storage.insert_text(&text).await?;
    Ok((StatusCode::CREATED, Json(text)))
}

async fn add_text(
    State(state): State<ApiState>,
    Json(text): Json<NewText>,
) -> ApiResult<(StatusCode, Json<Text>)> {
    let classifier = state
        .classifier
        .as_ref()
        .ok_or(ClassifierError::Unavailable)?;

    let text = classify_text(classifier.as_ref(), text).await?;
    let text = state.storage.insert_text(&text).await?;
    Ok((StatusCode::CREATED, Json(text)))
}

async fn delete_text(
    State(state): State<ApiState>,
    Query(q): Query<TextIdQuery>,
) -> ApiResult<Json<Text>> {
    Ok(Json(state.storage.delete_text(q.text_id).await?))
}

async fn create_citation(
    State(state): State<ApiState>,
    Json(citation): Json<Citation>,
) -> ApiResult<(StatusCode, Json<Citation>)> {
    let citation = state.storage.insert_citation(&citation).await?;
    Ok((StatusCode::CREATED, Json(citation)))
}

// ── Search & graph ──────────────────────────────────────────────────

async fn search(
    State(state): State<ApiState>,
    Query(filters): Query<SearchFilters>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let query = SearchQuery::new(filters, Some(state.search_page_limit));
    Ok(Json(state.search.search(&query).await?))
}

async fn graph(
    State(state): State<ApiState>,
    Query(params): Query<GraphParams>,
) -> ApiResult<Response> {
    let start = match params.start.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|e| ApiError::BadRequest(format!("Invalid start vertex '{}': {}", raw, e)))?,
        ),
    };

    let size_cut = params.size_cut.filter(|&n| n > 0);
    let records = state.storage.authorship(size_cut).await?;
    let graph = CoauthorGraph::from_authorship(&records);

    let view = graph.view(
        start,
        params.edge_type.unwrap_or_default(),
        params.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        params.use_weights.unwrap_or(true),
    )?;

    Ok(match params.format.unwrap_or_default() {
        GraphFormat::Json => Json(view).into_response(),
        GraphFormat::Html => Html(view.to_html()).into_response(),
    })
}

async fn health(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let texts = state.storage.count_texts().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        texts,
    }))
}
