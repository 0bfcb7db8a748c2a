//! Answering one question against a pool of extracted clauses.
//!
//! Each question moves through three stages, each owning its output:
//! [`ParsedQuestion`] → [`RetrievedQuestion`] → [`Answer`].

pub mod decision;
pub mod parser;

pub use decision::{DecisionSynthesizer, parse_amount, parse_decision};
pub use parser::QueryParser;

use extract::{Clause, Decision, ParseOutcome, StructuredQuery};
use index::RelevanceSelector;
use tracing::{debug, warn};

/// Which step of answering degraded to its fallback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStage {
    QueryParsing,
    DecisionSynthesis,
}

#[derive(Debug, Clone)]
pub struct ParsedQuestion {
    pub question: String,
    pub query: StructuredQuery,
    fallbacks: Vec<FallbackStage>,
}

#[derive(Debug, Clone)]
pub struct RetrievedQuestion {
    pub question: String,
    pub query: StructuredQuery,
    pub clauses: Vec<Clause>,
    fallbacks: Vec<FallbackStage>,
}

/// The decided question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub decision: Decision,
    pub query: StructuredQuery,
    pub fallbacks: Vec<FallbackStage>,
}

impl ParsedQuestion {
    pub async fn retrieve(
        self,
        selector: &RelevanceSelector,
        pool: &[Clause],
        top_k: usize,
    ) -> RetrievedQuestion {
        let clauses = selector.select(&self.query, pool, top_k).await;
        debug!(selected = clauses.len(), pool = pool.len(), "Retrieved clauses");

        RetrievedQuestion {
            question: self.question,
            query: self.query,
            clauses,
            fallbacks: self.fallbacks,
        }
    }
}

impl RetrievedQuestion {
    pub async fn decide(self, synthesizer: &DecisionSynthesizer) -> Answer {
        let outcome = synthesizer
            .decide(&self.question, &self.query, &self.clauses)
            .await;

        let mut fallbacks = self.fallbacks;
        record(&mut fallbacks, FallbackStage::DecisionSynthesis, &outcome);

        Answer {
            decision: outcome.into_value(),
            query: self.query,
            fallbacks,
        }
    }
}

fn record<T>(fallbacks: &mut Vec<FallbackStage>, stage: FallbackStage, outcome: &ParseOutcome<T>) {
    if let Some(reason) = outcome.fallback_reason() {
        warn!(?stage, reason, "Using fallback value");
        fallbacks.push(stage);
    }
}

/// Runs the query parser, relevance selector and decision synthesizer for
/// a question.
#[derive(Clone)]
pub struct QuestionAnswerer {
    parser: QueryParser,
    selector: RelevanceSelector,
    synthesizer: DecisionSynthesizer,
    top_k: usize,
}

impl QuestionAnswerer {
    pub fn new(
        parser: QueryParser,
        selector: RelevanceSelector,
        synthesizer: DecisionSynthesizer,
        top_k: usize,
    ) -> Self {
        Self {
            parser,
            selector,
            synthesizer,
            top_k,
        }
    }

    pub async fn parse(&self, question: &str) -> ParsedQuestion {
        let outcome = self.parser.parse(question).await;
        let mut fallbacks = Vec::new();
        record(&mut fallbacks, FallbackStage::QueryParsing, &outcome);

        ParsedQuestion {
            question: question.to_string(),
            query: outcome.into_value(),
            fallbacks,
        }
    }

    pub async fn answer(&self, question: &str, pool: &[Clause]) -> Answer {
        self.parse(question)
            .await
            .retrieve(&self.selector, pool, self.top_k)
            .await
            .decide(&self.synthesizer)
            .await
    }
}
