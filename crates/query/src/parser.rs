use extract::{Llm, ParseOutcome, StructuredQuery, parse_or_fallback, prompt};
use std::sync::Arc;
use tracing::debug;

/// Turns a free-text question into a [`StructuredQuery`].
#[derive(Clone)]
pub struct QueryParser {
    llm: Arc<dyn Llm>,
}

impl QueryParser {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Never fails: unreadable output (or a failed call) yields the
    /// all-null query as a fallback.
    pub async fn parse(&self, question: &str) -> ParseOutcome<StructuredQuery> {
        let prompt = prompt::build_query_parsing_prompt(question);

        let response = match self.llm.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                return ParseOutcome::fallback(
                    StructuredQuery::default(),
                    format!("LLM call failed: {e:#}"),
                );
            }
        };

        let outcome = parse_or_fallback(
            &response,
            |value| {
                StructuredQuery::from_value(&value)
                    .ok_or_else(|| "expected JSON object".to_string())
            },
            StructuredQuery::default,
        );
        if outcome.is_fallback() {
            debug!(raw = %response, "Unparseable query parsing response");
        }
        outcome
    }
}
