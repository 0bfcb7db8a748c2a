use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::Embedder;

/// Deterministic embedder for tests: one dimension per keyword, valued by
/// how often the keyword occurs in the (lowercased) text.
#[derive(Debug, Clone)]
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| text.matches(k.as_str()).count() as f32)
            .collect())
    }
}
