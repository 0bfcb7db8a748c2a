use anyhow::Context;
use api::{AppConfig, build_state, create_router, init_tracing};
use extract::{Guarded, Llm, OllamaClient};
use index::{CachedEmbedder, Embedder, EmbeddingCache, EmbeddingClient};
use ingest::HttpFetcher;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(mode = ?config.mode, bind = %config.server.bind_addr, "Starting policy query service");

    let policy = config.retry_policy();
    let timeout = config.llm_timeout();

    // Falls back to the preferred name if the model listing is unavailable
    let ollama = OllamaClient::with_resolved_model(config.llm.base_url.clone(), &config.llm.preferred_model).await;
    let model = ollama.model().to_string();
    info!(model = %model, "Using LLM model");
    let llm: Arc<dyn Llm> = Arc::new(Guarded::new(ollama, policy.clone(), timeout));

    let embedding_client = EmbeddingClient::new(config.llm.base_url.clone(), config.llm.embedding_model.clone());
    info!(model = %embedding_client.model(), "Using embedding model");
    let embedding_client = Guarded::new(embedding_client, policy, timeout);
    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(EmbeddingCache::new(config.cache.max_entries)));
    let embedder: Arc<dyn Embedder> = match &cache {
        Some(cache) => Arc::new(CachedEmbedder::new(embedding_client, cache.clone())),
        None => Arc::new(embedding_client),
    };

    let state = build_state(&config, llm, embedder, Arc::new(HttpFetcher::default()), cache, model)
        .context("Invalid chunking configuration")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("Listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
