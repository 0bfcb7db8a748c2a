use anyhow::{Context, Result};
use extract::RetryPolicy;
use ingest::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub mode: OperationMode,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // More parallel model calls, fewer retries
    Accurate,  // Patient retries, no embedding cache
    Balanced,  // Default
}

impl FromStr for OperationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "accurate" => Ok(Self::Accurate),
            "balanced" => Ok(Self::Balanced),
            other => anyhow::bail!("unknown mode '{}' (expected fast, balanced or accurate)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Token every `/hackrx/run` request must present as `Bearer <token>`.
    pub bearer_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    /// Resolved once at startup against the models the server lists.
    pub preferred_model: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
    pub max_concurrent_documents: usize,
    pub llm_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub chunk_max_words: usize,
    pub chunk_overlap_words: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "0.0.0.0:3000".to_string(),
                bearer_token: String::new(),
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                preferred_model: "llama3".to_string(),
                embedding_model: "nomic-embed-text".to_string(),
            },
            mode: OperationMode::Balanced,
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: 4,
                max_concurrent_documents: 2,
                llm_timeout_secs: 60,
                request_timeout_secs: 300,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
            retrieval: RetrievalConfig {
                top_k: index::DEFAULT_TOP_K,
                chunk_max_words: 800,
                chunk_overlap_words: 200,
            },
        }
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Fast;
        config.concurrency = ConcurrencyConfig {
            max_concurrent_llm_calls: 10,
            max_concurrent_documents: 4,
            llm_timeout_secs: 30,
            request_timeout_secs: 180,
        };
        config.retry = RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        };
        config.cache = CacheConfig {
            enabled: true,
            max_entries: 50000,
        };
        config
    }

    pub fn accurate_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Accurate;
        config.concurrency = ConcurrencyConfig {
            max_concurrent_llm_calls: 2,
            max_concurrent_documents: 1,
            llm_timeout_secs: 120,
            request_timeout_secs: 600,
        };
        config.retry = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 2000,
            max_backoff_ms: 20000,
        };
        config.cache = CacheConfig {
            enabled: false,
            max_entries: 0,
        };
        config
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Start from the `MODE` preset and apply individual overrides.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = parse_var::<OperationMode>(&lookup, "MODE")?.unwrap_or(OperationMode::Balanced);
        let mut config = Self::for_mode(mode);

        if let Some(addr) = lookup("BIND_ADDR") {
            config.server.bind_addr = addr;
        }
        config.server.bearer_token = lookup("API_BEARER_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context("API_BEARER_TOKEN must be set")?;

        if let Some(url) = lookup("OLLAMA_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            config.llm.preferred_model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }

        let c = &mut config.concurrency;
        override_with(&lookup, "MAX_CONCURRENT_LLM_CALLS", &mut c.max_concurrent_llm_calls)?;
        override_with(&lookup, "MAX_CONCURRENT_DOCUMENTS", &mut c.max_concurrent_documents)?;
        override_with(&lookup, "LLM_TIMEOUT_SECS", &mut c.llm_timeout_secs)?;
        override_with(&lookup, "REQUEST_TIMEOUT_SECS", &mut c.request_timeout_secs)?;

        override_with(&lookup, "MAX_RETRIES", &mut config.retry.max_retries)?;
        override_with(&lookup, "CACHE_ENABLED", &mut config.cache.enabled)?;

        let r = &mut config.retrieval;
        override_with(&lookup, "TOP_K", &mut r.top_k)?;
        override_with(&lookup, "CHUNK_MAX_WORDS", &mut r.chunk_max_words)?;
        override_with(&lookup, "CHUNK_OVERLAP_WORDS", &mut r.chunk_overlap_words)?;

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_words: self.retrieval.chunk_max_words,
            overlap_words: self.retrieval.chunk_overlap_words,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.concurrency.llm_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.concurrency.request_timeout_secs)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e)),
        None => Ok(None),
    }
}

fn override_with<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = parse_var(lookup, key)? {
        *slot = value;
    }
    Ok(())
}
