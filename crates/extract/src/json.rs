//! Reading JSON out of untrusted model text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[\w-]*[ \t]*\n?(.*?)\n?[ \t]*```$").expect("valid regex"));

/// Result of reading a model response: either the parsed value, or the
/// fallback value together with the reason parsing failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Fallback { value: T, reason: String },
}

impl<T> ParseOutcome<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self::Fallback {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Self::Parsed(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Parsed(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Parsed(value) | Self::Fallback { value, .. } => value,
        }
    }
}

/// Remove a Markdown code fence (```` ``` ```` or ```` ```json ````) wrapped
/// around a response. An unterminated fence only loses its opening line.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(captures) = FENCED.captures(trimmed) {
        if let Some(inner) = captures.get(1) {
            return inner.as_str().trim();
        }
    }

    if trimmed.starts_with("```") {
        return match trimmed.split_once('\n') {
            Some((_, rest)) => rest.trim(),
            None => "",
        };
    }

    trimmed
}

/// Parse a model response as JSON. Code fences are stripped first; if the
/// result still is not JSON, the first `[` or `{` that starts a complete
/// value is used so prose around the payload does not lose it.
pub fn parse_json_response(raw: &str) -> Result<Value, String> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            embedded_json(cleaned).ok_or_else(|| format!("invalid JSON: {first_error}"))
        }
    }
}

/// Parse a response and convert it, substituting `fallback` on any failure.
pub fn parse_or_fallback<T>(
    raw: &str,
    convert: impl FnOnce(Value) -> Result<T, String>,
    fallback: impl FnOnce() -> T,
) -> ParseOutcome<T> {
    match parse_json_response(raw).and_then(convert) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(reason) => ParseOutcome::fallback(fallback(), reason),
    }
}

fn embedded_json(text: &str) -> Option<Value> {
    text.match_indices(['[', '{']).find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_fences_with_language() {
        let response = "```json\n[{\"text\": \"a\"}]\n```";
        assert_eq!(strip_code_fences(response), "[{\"text\": \"a\"}]");
    }

    #[test]
    fn test_strip_fences_without_language() {
        assert_eq!(strip_code_fences("```\n{\"k\": 1}\n```"), "{\"k\": 1}");
        assert_eq!(strip_code_fences("```json {\"k\": 1} ```"), "{\"k\": 1}");
    }

    #[test]
    fn test_strip_fences_leaves_plain_json() {
        assert_eq!(strip_code_fences("  {\"k\": 1}\n"), "{\"k\": 1}");
    }

    #[test]
    fn test_unterminated_fence_drops_opening_line() {
        assert_eq!(strip_code_fences("```json\n[1, 2]"), "[1, 2]");
        assert_eq!(strip_code_fences("```"), "");
    }

    #[test]
    fn test_parse_recovers_payload_inside_prose() {
        let value = parse_json_response("Here are the clauses: [{\"text\": \"x\"}] Hope this helps.").unwrap();
        assert_eq!(value, json!([{"text": "x"}]));

        let value = parse_json_response("Sure! {\"decision\": \"approved\"}").unwrap();
        assert_eq!(value, json!({"decision": "approved"}));
    }

    #[test]
    fn test_parse_skips_brackets_in_prose() {
        let value = parse_json_response("See [note]: [{\"clause_id\": \"2\", \"text\": \"x\"}]").unwrap();
        assert_eq!(value, json!([{"clause_id": "2", "text": "x"}]));

        let value = parse_json_response("Per {section 4} the answer is {\"decision\": \"rejected\"} [end]").unwrap();
        assert_eq!(value, json!({"decision": "rejected"}));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_json_response("I could not find any clauses.").is_err());
        assert!(parse_json_response("").is_err());
    }

    #[test]
    fn test_parse_or_fallback_tags_result() {
        let parsed = parse_or_fallback("[1]", |v| Ok(v.as_array().map_or(0, Vec::len)), || 0);
        assert_eq!(parsed, ParseOutcome::Parsed(1));

        let failed = parse_or_fallback("nope", |_| Ok(5), || 0);
        assert!(failed.is_fallback());
        assert_eq!(*failed.value(), 0);
        assert!(failed.fallback_reason().unwrap().starts_with("invalid JSON"));

        let rejected = parse_or_fallback("{}", |_| Err::<usize, _>("expected array".into()), || 0);
        assert_eq!(rejected.fallback_reason(), Some("expected array"));
        assert_eq!(rejected.into_value(), 0);
    }
}
