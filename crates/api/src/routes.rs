use crate::error::ApiError;
use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};
use crate::pipeline::{Pipeline, QueryRequest, QueryResult};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use index::{CacheStats, EmbeddingCache};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub metrics: Arc<Metrics>,
    pub cache: Option<Arc<EmbeddingCache>>,
    pub bearer_token: Arc<str>,
    pub model: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub metrics: MetricsSnapshot,
    pub cache: Option<CacheStats>,
}

pub fn create_router(state: AppState) -> Router {
    // route_layer: the token is checked before the JSON body is read
    let protected = Router::new()
        .route("/hackrx/run", post(run_query))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // An unset token admits nobody
    let authorized = !state.bearer_token.is_empty()
        && request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_once(' '))
            .is_some_and(|(scheme, token)| {
                scheme.eq_ignore_ascii_case("bearer") && token.trim() == &*state.bearer_token
            });

    if !authorized {
        state.metrics.record_rejected();
        warn!(path = %request.uri().path(), "Rejected request with invalid or missing token");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the policy query API. POST questions to /hackrx/run." }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.model.clone(),
    })
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: state.metrics.snapshot(),
        cache: state.cache.as_ref().map(|cache| cache.stats()),
    })
}

async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let timer = TimedOperation::start();

    let result = match tokio::time::timeout(state.request_timeout, state.pipeline.run(&request)).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(ApiError::from(e)),
        Err(_) => Err(ApiError::DeadlineExceeded(state.request_timeout.as_secs())),
    };

    state.metrics.record_request(result.is_ok());
    match &result {
        Ok(r) => info!(
            query_id = %r.query_id,
            answers = r.answers.len(),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Request succeeded"
        ),
        Err(e) => error!(error = %e, elapsed_ms = timer.elapsed().as_millis() as u64, "Request failed"),
    }

    result.map(Json)
}
