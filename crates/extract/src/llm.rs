use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Text generation capability: prompt in, raw model text out.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client whose model is resolved once against the models the
    /// server reports. See [`resolve_model_name`].
    pub async fn with_resolved_model(base_url: String, preferred: &str) -> Self {
        let probe = Self::new(base_url, preferred.to_string());
        let model = resolve_model_name(preferred, probe.list_models().await);
        info!(model = %model, preferred, "Resolved LLM model");
        Self { model, ..probe }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to list Ollama models")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama model listing failed: {}", response.status());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama model list")?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Llm for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

/// Pick the model to use: the first listed model whose name contains
/// `preferred`, else the first listed model, else `preferred` itself. A
/// failed listing also yields `preferred`.
pub fn resolve_model_name(preferred: &str, listing: Result<Vec<String>>) -> String {
    match listing {
        Ok(models) => models
            .iter()
            .find(|name| name.contains(preferred))
            .or_else(|| models.first())
            .cloned()
            .unwrap_or_else(|| preferred.to_string()),
        Err(e) => {
            warn!(error = %e, preferred, "Error listing models, using preferred name");
            preferred.to_string()
        }
    }
}
