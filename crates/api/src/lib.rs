//! HTTP service answering insurance-policy questions from remote documents.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod routes;

pub use config::{AppConfig, OperationMode};
pub use error::ApiError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::{Pipeline, QueryRequest, QueryResult};
pub use routes::{AppState, HealthResponse, StatsResponse, create_router};

use extract::Llm;
use index::{Embedder, EmbeddingCache};
use ingest::{ChunkError, DocumentFetcher};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Wire the pipeline and shared state from already-built clients.
pub fn build_state(
    config: &AppConfig,
    llm: Arc<dyn Llm>,
    embedder: Arc<dyn Embedder>,
    fetcher: Arc<dyn DocumentFetcher>,
    cache: Option<Arc<EmbeddingCache>>,
    model: impl Into<String>,
) -> Result<AppState, ChunkError> {
    let metrics = Metrics::new();
    let pipeline = Pipeline::new(config, llm, embedder, fetcher, metrics.clone())?;

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        metrics,
        cache,
        bearer_token: Arc::from(config.server.bearer_token.as_str()),
        model: model.into(),
        request_timeout: config.request_timeout(),
    })
}

/// `RUST_LOG` controls the filter (default `info`); `LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
