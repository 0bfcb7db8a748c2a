use crate::schema::{Clause, StructuredQuery};

/// Appended to every prompt.
pub const JSON_ONLY_SUFFIX: &str =
    "Return ONLY valid JSON. Do not include any explanation, markdown, or code fences.";

pub const CLAUSE_EXTRACTION_TASK: &str = "Given the following insurance policy text, extract all clauses with their IDs (if present) and text.";
pub const QUERY_PARSING_TASK: &str = "Parse the following user query into a structured JSON object.";
pub const DECISION_TASK: &str = "Given the user query and the relevant policy clauses, decide if the claim should be approved or rejected.";

pub fn build_clause_extraction_prompt(chunk_text: &str) -> String {
    format!(
        r#"{CLAUSE_EXTRACTION_TASK}

INSTRUCTIONS:
1. A clause is a single contractual statement: a coverage, exclusion, condition, limit, waiting period or definition
2. Use the clause number or heading printed in the text as clause_id, or null if there is none
3. Copy the clause text faithfully; do not summarise
4. If no clauses are found, return an empty array []

SCHEMA:
[
  {{"clause_id": "4.1" or null, "text": "clause text"}}
]

TEXT:
{chunk_text}

Return a JSON array only. {JSON_ONLY_SUFFIX}"#
    )
}

pub fn build_query_parsing_prompt(question: &str) -> String {
    format!(
        r#"{QUERY_PARSING_TASK}

SCHEMA (exactly these five fields):
{{
  "age": integer or null,
  "gender": string or null,
  "procedure": string or null,
  "location": string or null,
  "policy_duration_months": integer or null
}}

RULES:
- If a field is missing from the query, set it to null
- Convert policy durations to months (e.g. "1 year" -> 12)

QUERY:
{question}

{JSON_ONLY_SUFFIX}"#
    )
}

pub fn build_decision_prompt(
    question: &str,
    structured_query: &StructuredQuery,
    relevant_clauses: &[Clause],
) -> String {
    let structured = serde_json::to_string_pretty(structured_query).unwrap_or_else(|_| "{}".into());
    let clauses = serde_json::to_string_pretty(relevant_clauses).unwrap_or_else(|_| "[]".into());

    format!(
        r#"{DECISION_TASK} Determine the payout amount and provide a justification.

SCHEMA:
{{
  "decision": "approved" | "rejected",
  "amount": number or null,
  "justification": "explanation that cites the clauses",
  "referenced_clauses": [{{"clause_id": "4.1" or null, "text": "clause text"}}]
}}

RULES:
- Base the decision only on the clauses provided
- referenced_clauses must echo the clause_id and text of every clause the decision relies on
- Use null for amount when no payout applies or it cannot be determined

USER QUERY:
{question}

STRUCTURED QUERY:
{structured}

RELEVANT CLAUSES:
{clauses}

{JSON_ONLY_SUFFIX}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_end_with_json_instruction() {
        let prompts = [
            build_clause_extraction_prompt("Clause 1: text"),
            build_query_parsing_prompt("46M, knee surgery"),
            build_decision_prompt("q", &StructuredQuery::default(), &[]),
        ];

        for prompt in prompts {
            assert!(prompt.trim_end().ends_with(JSON_ONLY_SUFFIX));
        }
    }

    #[test]
    fn test_decision_prompt_embeds_inputs() {
        let query = StructuredQuery {
            age: Some(46),
            ..Default::default()
        };
        let clauses = vec![Clause::new(Some("3.2"), "Knee surgery covered after 90 days")];
        let prompt = build_decision_prompt("Is knee surgery covered?", &query, &clauses);

        assert!(prompt.starts_with(DECISION_TASK));
        assert!(prompt.contains("Is knee surgery covered?"));
        assert!(prompt.contains("\"age\": 46"));
        assert!(prompt.contains("\"clause_id\": \"3.2\""));
    }

    #[test]
    fn test_clause_prompt_contains_chunk() {
        let prompt = build_clause_extraction_prompt("Pre-existing diseases are excluded.");
        assert!(prompt.starts_with(CLAUSE_EXTRACTION_TASK));
        assert!(prompt.contains("Pre-existing diseases are excluded."));
        assert!(prompt.contains("[]"));
    }
}
