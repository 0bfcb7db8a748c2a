//! One `/hackrx/run` request: build the clause pool from every document,
//! then answer every question against it.

use crate::config::AppConfig;
use crate::metrics::{Metrics, TimedOperation};
use extract::{Clause, ClauseExtractor, Decision, Llm};
use futures::FutureExt;
use futures::stream::{self, StreamExt, TryStreamExt};
use index::{Embedder, RelevanceSelector};
use ingest::{ChunkError, Chunker, DocumentFetcher, IngestError, ingest_document};
use query::{DecisionSynthesizer, FallbackStage, QueryParser, QuestionAnswerer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub documents: Vec<String>,
    pub questions: Vec<String>,
}

/// `answers[i]` always belongs to `questions[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answers: Vec<Decision>,
    pub query_id: String,
}

pub struct Pipeline {
    fetcher: Arc<dyn DocumentFetcher>,
    chunker: Chunker,
    extractor: ClauseExtractor,
    answerer: QuestionAnswerer,
    max_concurrent_documents: usize,
    max_concurrent_questions: usize,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        llm: Arc<dyn Llm>,
        embedder: Arc<dyn Embedder>,
        fetcher: Arc<dyn DocumentFetcher>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ChunkError> {
        let chunker = Chunker::new(config.chunker_config())?;
        let llm_calls = config.concurrency.max_concurrent_llm_calls.max(1);

        let extractor = ClauseExtractor::new(llm.clone()).with_concurrency(llm_calls);
        let answerer = QuestionAnswerer::new(
            QueryParser::new(llm.clone()),
            RelevanceSelector::new(embedder).with_concurrency(llm_calls),
            DecisionSynthesizer::new(llm),
            config.retrieval.top_k,
        );

        Ok(Self {
            fetcher,
            chunker,
            extractor,
            answerer,
            max_concurrent_documents: config.concurrency.max_concurrent_documents.max(1),
            max_concurrent_questions: llm_calls,
            metrics,
        })
    }

    pub async fn run(&self, request: &QueryRequest) -> Result<QueryResult, IngestError> {
        let query_id = Uuid::new_v4().to_string();
        let span = info_span!("query", query_id = %query_id);

        async {
            info!(
                documents = request.documents.len(),
                questions = request.questions.len(),
                "Processing query"
            );

            let pool = self.build_clause_pool(&request.documents).await?;
            let answers = self.answer_questions(&request.questions, &pool).await;

            info!(clauses = pool.len(), answers = answers.len(), "Query complete");
            Ok::<_, IngestError>(QueryResult { answers, query_id })
        }
        .instrument(span)
        .await
    }

    /// Clauses of all documents, concatenated in request order. The first
    /// document that fails to ingest aborts the whole pool.
    pub async fn build_clause_pool(&self, urls: &[String]) -> Result<Vec<Clause>, IngestError> {
        let per_document: Vec<Vec<Clause>> = stream::iter(urls)
            .map(|url| self.process_document(url).boxed())
            .boxed()
            .buffered(self.max_concurrent_documents)
            .try_collect()
            .await?;

        Ok(per_document.into_iter().flatten().collect())
    }

    async fn process_document(&self, url: &str) -> Result<Vec<Clause>, IngestError> {
        let timer = TimedOperation::start();
        let document = ingest_document(self.fetcher.as_ref(), url, &self.chunker).await?;
        let report = self.extractor.extract_batch(&document.chunks).await;

        self.metrics.record_document(
            timer.elapsed(),
            document.chunks.len(),
            report.clauses.len(),
            report.failed_chunks,
        );
        info!(
            url,
            chunks = document.chunks.len(),
            clauses = report.clauses.len(),
            failed_chunks = report.failed_chunks,
            "Extracted clauses"
        );

        Ok(report.clauses)
    }

    /// One decision per question, in question order.
    pub async fn answer_questions(&self, questions: &[String], pool: &[Clause]) -> Vec<Decision> {
        stream::iter(questions)
            .map(|question| async move {
                let timer = TimedOperation::start();
                let answer = self.answerer.answer(question, pool).await;
                self.metrics.record_answer(
                    timer.elapsed(),
                    answer.fallbacks.contains(&FallbackStage::QueryParsing),
                    answer.fallbacks.contains(&FallbackStage::DecisionSynthesis),
                );
                answer.decision
            }
            .boxed())
            .boxed()
            .buffered(self.max_concurrent_questions)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::{MockLlm, prompt};
    use index::KeywordEmbedder;
    use ingest::Document;

    struct EmlFetcher;

    #[async_trait]
    impl DocumentFetcher for EmlFetcher {
        async fn fetch(&self, url: &str) -> Result<Document, IngestError> {
            if url.contains("missing") {
                return Err(IngestError::Fetch {
                    url: url.to_string(),
                    reason: "HTTP 404".to_string(),
                });
            }
            let body = format!("Subject: policy\r\nContent-Type: text/plain\r\n\r\nPolicy text of {url}\r\n");
            Ok(Document::from_bytes(url, "eml", body.as_bytes())?)
        }
    }

    fn pipeline(llm: MockLlm) -> Pipeline {
        Pipeline::new(
            &AppConfig::default(),
            Arc::new(llm),
            Arc::new(KeywordEmbedder::new(&["knee"])),
            Arc::new(EmlFetcher),
            Metrics::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_clause_pool_keeps_document_order() {
        let llm = MockLlm::new("[]")
            .on("https://a.test/one.eml", r#"[{"clause_id": "A", "text": "first"}]"#)
            .on("https://a.test/two.eml", r#"[{"clause_id": "B", "text": "second"}]"#);
        let urls = vec![
            "https://a.test/one.eml".to_string(),
            "https://a.test/two.eml".to_string(),
        ];

        let pool = pipeline(llm).build_clause_pool(&urls).await.unwrap();

        let ids: Vec<_> = pool.iter().map(|c| c.clause_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("A"), Some("B")]);
    }

    #[tokio::test]
    async fn test_failed_document_aborts_pool() {
        let urls = vec![
            "https://a.test/one.eml".to_string(),
            "https://a.test/missing.eml".to_string(),
        ];

        let err = pipeline(MockLlm::new("[]")).build_clause_pool(&urls).await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_answers_align_with_questions() {
        let llm = MockLlm::new("{}")
            .on(prompt::QUERY_PARSING_TASK, "{}")
            .on("QUESTION-A", r#"{"decision": "approved", "justification": "a"}"#)
            .on("QUESTION-B", r#"{"decision": "rejected", "justification": "b"}"#);
        let questions = vec![
            "QUESTION-B".to_string(),
            "QUESTION-A".to_string(),
            "QUESTION-B".to_string(),
        ];

        let pipeline = pipeline(llm);
        let answers = pipeline.answer_questions(&questions, &[]).await;

        let decisions: Vec<_> = answers.iter().map(|a| a.decision.as_str()).collect();
        assert_eq!(decisions, vec!["rejected", "approved", "rejected"]);
        assert_eq!(pipeline.metrics.snapshot().questions_answered, 3);
    }
}
