//! HTTP presentation layer.
//!
//! Handlers are thin: they call into the pipeline and serialize what comes back.
//! A client that disconnects mid-analysis drops the handler future, which stops the
//! scoring loop before the next headline.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::category::SentimentCategory;
use crate::config::SentinelConfig;
use crate::error::PipelineError;
use crate::headline::{HeadlineRecord, Scorer};
use crate::history::{AnalysisHistory, HistoryEntry};
use crate::pipeline::{score_batch, Analysis, AnalysisRequest, BatchReport, CancelFlag, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub history: Arc<AnalysisHistory>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, history_capacity: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            history: Arc::new(AnalysisHistory::with_capacity(history_capacity)),
        }
    }

    pub fn from_config(cfg: &SentinelConfig) -> Self {
        Self::new(Pipeline::from_config(cfg), cfg.history.capacity)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/batch", post(analyze_batch))
        .route("/search", get(search_get).post(search_post))
        .route("/history", get(history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Pipeline(e @ PipelineError::NoQuery) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Pipeline(e @ PipelineError::Configuration(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Pipeline(e @ PipelineError::Cancelled { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
        };
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

#[derive(Deserialize)]
struct AnalyzeReq {
    text: String,
}

#[derive(Serialize)]
struct AnalyzeResp {
    score: f64,
    category: SentimentCategory,
    scorer: Scorer,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    degraded_reason: Option<String>,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<AnalyzeResp>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let out = state.pipeline.policy().score_headline(&body.text).await;
    Ok(Json(AnalyzeResp {
        score: out.score,
        category: crate::category::categorize(out.score),
        scorer: out.scorer,
        degraded: out.is_degraded(),
        degraded_reason: out.degraded.map(|e| e.kind().to_string()),
    }))
}

async fn analyze_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<HeadlineRecord>>,
) -> Result<Json<BatchReport>, ApiError> {
    let report = score_batch(state.pipeline.policy(), items, &CancelFlag::new()).await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    limit: Option<usize>,
}

async fn search_get(
    State(state): State<AppState>,
    Query(p): Query<SearchParams>,
) -> Result<Json<Analysis>, ApiError> {
    let req = AnalysisRequest {
        queries: vec![p.q],
        max_results: p.limit,
    };
    run_search(&state, req).await
}

async fn search_post(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<Analysis>, ApiError> {
    run_search(&state, req).await
}

async fn run_search(state: &AppState, req: AnalysisRequest) -> Result<Json<Analysis>, ApiError> {
    let analysis = state.pipeline.analyze(&req, &CancelFlag::new()).await?;
    state.history.push(&analysis);
    Ok(Json(analysis))
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default)]
    limit: Option<usize>,
}

async fn history(
    State(state): State<AppState>,
    Query(p): Query<HistoryParams>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.history.snapshot_last_n(p.limit.unwrap_or(20)))
}
