use extract::{Clause, Decision, Llm, ParseOutcome, StructuredQuery, parse_or_fallback, prompt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

/// Asks the model for the final decision on one question.
#[derive(Clone)]
pub struct DecisionSynthesizer {
    llm: Arc<dyn Llm>,
}

impl DecisionSynthesizer {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Never fails: unreadable output (or a failed call) yields
    /// [`Decision::parse_failure`] as a fallback.
    pub async fn decide(
        &self,
        question: &str,
        structured_query: &StructuredQuery,
        relevant_clauses: &[Clause],
    ) -> ParseOutcome<Decision> {
        let prompt = prompt::build_decision_prompt(question, structured_query, relevant_clauses);

        let response = match self.llm.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                return ParseOutcome::fallback(
                    Decision::parse_failure(),
                    format!("LLM call failed: {e:#}"),
                );
            }
        };

        let outcome = parse_or_fallback(&response, parse_decision, Decision::parse_failure);
        if outcome.is_fallback() {
            debug!(raw = %response, "Unparseable decision response");
        }
        outcome
    }
}

/// Read a decision object. `decision` is required; a missing justification
/// is empty and unreadable clause entries are dropped.
pub fn parse_decision(value: Value) -> Result<Decision, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "expected JSON object".to_string())?;

    let decision = obj
        .get("decision")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| "missing 'decision'".to_string())?
        .to_string();

    let amount = obj.get("amount").and_then(parse_amount);

    let justification = obj
        .get("justification")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let referenced_clauses: Vec<Clause> = obj
        .get("referenced_clauses")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Clause::from_value).collect())
        .unwrap_or_default();

    Ok(Decision {
        decision,
        amount,
        justification,
        referenced_clauses,
    })
}

/// A number, or the first number inside a string such as "Rs. 50,000".
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits = s.replace(',', "");
            NUMBER
                .find(&digits)
                .and_then(|m| m.as_str().parse::<f64>().ok())
        }
        _ => None,
    };
    amount.filter(|a| a.is_finite())
}
