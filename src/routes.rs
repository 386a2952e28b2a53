use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Interest;
use crate::error::IngestError;
use crate::explore;
use crate::ingest::{IngestRequest, IngestService};
use crate::models::{ExploreSnapshot, SnapshotRequest, StoredArticle};
use crate::store::StoreError;

const ITEMS_PER_PAGE: i64 = 15;
const MAX_ITEMS_PER_PAGE: i64 = 100;

pub struct AppState {
    pub service: Arc<IngestService>,
    pub interests: Vec<Interest>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/articles", post(ingest_articles).options(preflight))
        .route("/api/articles/:interest_id", get(list_articles))
        .route("/api/explore", post(save_explore).options(preflight))
        .route("/api/interests", get(interests))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub struct AppError(IngestError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = match self.0.details() {
            Some(details) => json!({ "error": self.0.to_string(), "details": details }),
            None => json!({ "error": self.0.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(IngestError::validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExploreResponse {
    pub success: bool,
    pub message: String,
    pub data: ExploreSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticlePage {
    pub articles: Vec<StoredArticle>,
    pub total: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: i64,
    pub limit: Option<i64>,
}

impl PageQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(ITEMS_PER_PAGE)
            .clamp(1, MAX_ITEMS_PER_PAGE)
    }

    fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

// Route handlers
pub async fn ingest_articles(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let report = state.service.ingest(request).await?;
    Ok(Json(report))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Path(interest_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.service.store();
    let load_failed = |source: StoreError| IngestError::StoreQuery {
        message: "Failed to load articles",
        source,
    };

    let limit = query.limit();
    let offset = query.offset();
    let articles = store
        .list_articles(&interest_id, limit, offset)
        .await
        .map_err(load_failed)?;
    let total = store.count_articles(&interest_id).await.map_err(load_failed)?;

    Ok(Json(ArticlePage {
        has_more: offset + (articles.len() as i64) < total,
        articles,
        total,
        offset,
    }))
}

pub async fn save_explore(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SnapshotRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let data = explore::save_snapshot(state.service.store().as_ref(), request).await?;

    Ok(Json(ExploreResponse {
        success: true,
        message: "News saved to explore table successfully".to_string(),
        data,
    }))
}

pub async fn interests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.interests.clone())
}

/// Bare OPTIONS requests. Preflights carrying CORS headers are answered by
/// the CORS layer before reaching this.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
