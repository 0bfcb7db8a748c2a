pub mod json;
pub mod llm;
pub mod mock;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use json::{ParseOutcome, parse_json_response, parse_or_fallback, strip_code_fences};
pub use llm::{Llm, OllamaClient, resolve_model_name};
pub use mock::MockLlm;
pub use retry::{Guarded, RetryPolicy};
pub use schema::{Clause, Decision, StructuredQuery};

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Clauses pulled from a batch of chunks, plus how many chunks contributed
/// nothing because the model call or its output failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub clauses: Vec<Clause>,
    pub failed_chunks: usize,
}

/// Asks the model to identify the clauses inside policy text.
#[derive(Clone)]
pub struct ClauseExtractor {
    llm: Arc<dyn Llm>,
    max_concurrency: usize,
}

impl ClauseExtractor {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            max_concurrency: 1,
        }
    }

    /// Number of chunks sent to the model at once.
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Extract the clauses of a single chunk. Any failure yields an empty
    /// list tagged as a fallback.
    pub async fn extract_clauses(&self, chunk_text: &str) -> ParseOutcome<Vec<Clause>> {
        let prompt = prompt::build_clause_extraction_prompt(chunk_text);

        let response = match self.llm.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => return ParseOutcome::fallback(Vec::new(), format!("LLM call failed: {e:#}")),
        };

        let outcome = parse_or_fallback(&response, parse_clause_array, Vec::new);
        if outcome.is_fallback() {
            debug!(raw = %response, "Unparseable clause extraction response");
        }
        outcome
    }

    /// Extract clauses from every chunk, concatenated in chunk order.
    pub async fn extract_clauses_from_chunks<S>(&self, chunks: &[S]) -> Vec<Clause>
    where
        S: AsRef<str> + Sync,
    {
        self.extract_batch(chunks).await.clauses
    }

    /// Like [`Self::extract_clauses_from_chunks`], also counting failed chunks.
    /// A failed chunk never aborts the batch.
    pub async fn extract_batch<S>(&self, chunks: &[S]) -> ExtractionReport
    where
        S: AsRef<str> + Sync,
    {
        let outcomes: Vec<ParseOutcome<Vec<Clause>>> = stream::iter(chunks)
            .map(|chunk| self.extract_clauses(chunk.as_ref()).boxed())
            .boxed()
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut report = ExtractionReport::default();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            if let Some(reason) = outcome.fallback_reason() {
                warn!(chunk = i, reason, "Clause extraction failed for chunk");
                report.failed_chunks += 1;
            }
            report.clauses.extend(outcome.into_value());
        }

        report
    }
}

fn parse_clause_array(value: Value) -> Result<Vec<Clause>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(format!("expected JSON array, got {}", json_kind(&other))),
    };

    let total = items.len();
    let clauses: Vec<Clause> = items.iter().filter_map(Clause::from_value).collect();
    if clauses.len() < total {
        debug!(skipped = total - clauses.len(), "Skipped malformed clause entries");
    }

    Ok(clauses)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
