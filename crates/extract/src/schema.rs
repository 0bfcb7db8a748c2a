use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A discrete contractual statement, optionally tagged with the identifier
/// the policy itself uses ("4.1", "Exclusion 3", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(default)]
    pub clause_id: Option<String>,
    pub text: String,
}

impl Clause {
    pub fn new(clause_id: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            clause_id: clause_id.map(str::to_string),
            text: text.into(),
        }
    }

    /// Read a clause from model output. Accepts `{"clause_id", "text"}`
    /// objects (numeric ids are stringified) and bare strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => non_empty(text).map(|text| Self::new(None, text)),
            Value::Object(obj) => {
                let text = obj.get("text").and_then(Value::as_str).and_then(non_empty)?;
                let clause_id = obj.get("clause_id").and_then(scalar_to_string);
                Some(Self {
                    clause_id,
                    text: text.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Normalised form of a free-text question. Every field is `None` when the
/// question does not state it or the model output could not be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub procedure: Option<String>,
    pub location: Option<String>,
    pub policy_duration_months: Option<u32>,
}

impl StructuredQuery {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-by-field read of a model-produced object; a field that cannot
    /// be interpreted becomes `None` without affecting the others.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        Some(Self {
            age: obj.get("age").and_then(|v| whole_number(v, false)),
            gender: obj.get("gender").and_then(scalar_to_string),
            procedure: obj.get("procedure").and_then(scalar_to_string),
            location: obj.get("location").and_then(scalar_to_string),
            policy_duration_months: obj
                .get("policy_duration_months")
                .and_then(|v| whole_number(v, true)),
        })
    }

    /// Text used to embed the query: one `field: value` line per known field.
    pub fn to_search_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(age) = self.age {
            lines.push(format!("age: {age}"));
        }
        if let Some(gender) = &self.gender {
            lines.push(format!("gender: {gender}"));
        }
        if let Some(procedure) = &self.procedure {
            lines.push(format!("procedure: {procedure}"));
        }
        if let Some(location) = &self.location {
            lines.push(format!("location: {location}"));
        }
        if let Some(months) = self.policy_duration_months {
            lines.push(format!("policy duration: {months} months"));
        }
        lines.join("\n")
    }
}

/// Final verdict for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,
    pub amount: Option<f64>,
    pub justification: String,
    pub referenced_clauses: Vec<Clause>,
}

impl Decision {
    pub const ERROR: &'static str = "error";
    pub const PARSE_FAILURE_JUSTIFICATION: &'static str = "LLM output parsing failed.";

    /// Returned in place of a decision the model output could not support.
    pub fn parse_failure() -> Self {
        Self {
            decision: Self::ERROR.to_string(),
            amount: None,
            justification: Self::PARSE_FAILURE_JUSTIFICATION.to_string(),
            referenced_clauses: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.decision == Self::ERROR
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative whole number from a JSON number or a string such as
/// "46 years". With `as_months`, a string mentioning years is converted.
fn whole_number(value: &Value, as_months: bool) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            let number: u32 = digits.parse().ok()?;
            if as_months && s.to_ascii_lowercase().contains("year") {
                number.checked_mul(12)
            } else {
                Some(number)
            }
        }
        _ => None,
    }
}
