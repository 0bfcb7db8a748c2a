use anyhow::Result;
use extract::{Clause, StructuredQuery};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embeddings::Embedder;

pub const DEFAULT_TOP_K: usize = 5;

/// Picks the clauses most similar to a structured query.
#[derive(Clone)]
pub struct RelevanceSelector {
    embedder: Arc<dyn Embedder>,
    max_concurrency: usize,
}

impl RelevanceSelector {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            max_concurrency: 1,
        }
    }

    /// Number of clause embeddings requested at once.
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Return at most `top_k` clauses, most similar first; ties keep pool
    /// order. A pool no larger than `top_k` comes back unchanged. If any
    /// embedding fails, the first `top_k` clauses of the pool are returned.
    pub async fn select(
        &self,
        query: &StructuredQuery,
        pool: &[Clause],
        top_k: usize,
    ) -> Vec<Clause> {
        if pool.len() <= top_k {
            return pool.to_vec();
        }
        if top_k == 0 {
            return Vec::new();
        }

        match self.score(query, pool).await {
            Ok(scores) => {
                let ranked = rank(&scores, top_k);
                debug!(pool = pool.len(), selected = ranked.len(), "Ranked clauses");
                ranked.into_iter().map(|(i, _)| pool[i].clone()).collect()
            }
            Err(e) => {
                warn!(error = %e, "Embedding failed, falling back to pool order");
                pool[..top_k].to_vec()
            }
        }
    }

    async fn score(&self, query: &StructuredQuery, pool: &[Clause]) -> Result<Vec<f32>> {
        let query_embedding = self.embedder.embed(&query.to_search_text()).await?;

        let clause_embeddings: Vec<Vec<f32>> = stream::iter(pool)
            .map(|clause| self.embedder.embed(&clause.text))
            .boxed()
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(clause_embeddings
            .iter()
            .map(|embedding| cosine_similarity(&query_embedding, embedding))
            .collect())
    }
}

/// Indices of the `top_k` highest scores, descending. The sort is stable so
/// equal scores keep their original order.
pub fn rank(scores: &[f32], top_k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_k);
    ranked
}

/// Cosine similarity; `0.0` for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::KeywordEmbedder;
    use async_trait::async_trait;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("embedding backend unavailable")
        }
    }

    fn pool() -> Vec<Clause> {
        vec![
            Clause::new(Some("1"), "Grace period of thirty days for premium payment"),
            Clause::new(Some("2"), "Knee surgery is covered after the waiting period"),
            Clause::new(Some("3"), "Maternity expenses are covered after 24 months"),
            Clause::new(Some("4"), "Surgery in Pune network hospitals is cashless"),
            Clause::new(Some("5"), "Cataract treatment is limited per eye"),
            Clause::new(Some("6"), "Organ donor expenses are covered"),
            Clause::new(Some("7"), "Knee replacement surgery in Pune is covered"),
        ]
    }

    fn knee_query() -> StructuredQuery {
        StructuredQuery {
            age: Some(46),
            procedure: Some("knee surgery".into()),
            location: Some("Pune".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let ranked = rank(&[0.2, 0.9, 0.2, 0.9, 0.1], 3);
        assert_eq!(ranked.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 3, 0]);
    }

    #[tokio::test]
    async fn test_select_ranks_by_similarity() {
        let embedder = KeywordEmbedder::new(&["knee", "surgery", "pune", "maternity"]);
        let selector = RelevanceSelector::new(Arc::new(embedder)).with_concurrency(4);

        let selected = selector.select(&knee_query(), &pool(), 3).await;

        let ids: Vec<_> = selected.iter().map(|c| c.clause_id.clone().unwrap()).collect();
        // 7 matches every keyword; 2 and 4 tie and keep pool order
        assert_eq!(ids, vec!["7", "2", "4"]);
    }

    #[tokio::test]
    async fn test_small_pool_returned_as_is_without_embedding() {
        let embedder = KeywordEmbedder::new(&["knee"]);
        let selector = RelevanceSelector::new(Arc::new(embedder.clone()));
        let small: Vec<_> = pool().into_iter().take(4).collect();

        let selected = selector.select(&knee_query(), &small, DEFAULT_TOP_K).await;

        assert_eq!(selected, small);
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_query_keeps_pool_order() {
        let embedder = KeywordEmbedder::new(&["knee", "surgery"]);
        let selector = RelevanceSelector::new(Arc::new(embedder));

        let selected = selector.select(&StructuredQuery::default(), &pool(), 5).await;

        assert_eq!(selected, pool()[..5].to_vec());
    }

    #[tokio::test]
    async fn test_embedding_failure_falls_back_to_pool_order() {
        let selector = RelevanceSelector::new(Arc::new(FailingEmbedder));

        let selected = selector.select(&knee_query(), &pool(), 2).await;

        assert_eq!(selected, pool()[..2].to_vec());
    }

    #[tokio::test]
    async fn test_never_more_than_top_k() {
        let embedder = KeywordEmbedder::new(&["covered"]);
        let selector = RelevanceSelector::new(Arc::new(embedder));

        for top_k in 0..9 {
            let selected = selector.select(&knee_query(), &pool(), top_k).await;
            assert!(selected.len() <= top_k);
            assert_eq!(selected.len(), top_k.min(pool().len()));
        }
    }
}
