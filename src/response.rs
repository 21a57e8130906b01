//! Defensive parsing of text-generation replies.
//!
//! A call to the service ends in one of three ways: transport failure
//! (`Err` from [`crate::llm::TextGenerator::generate`], fatal), a reply that
//! parses into the expected shape ([`ParseOutcome::Parsed`]), or a reply that
//! does not ([`ParseOutcome::Malformed`], recovered by the caller).

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Outcome of parsing one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Malformed(MalformedResponse),
}

/// A reply that could not be read; kept for operator inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedResponse {
    /// Which step produced it, e.g. `"pattern synthesis"`.
    pub step: String,
    pub detail: String,
    pub raw: String,
}

impl<T> ParseOutcome<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    /// The parsed value, or `fallback` when malformed.
    pub fn unwrap_or(self, fallback: T) -> T {
        match self {
            ParseOutcome::Parsed(v) => v,
            ParseOutcome::Malformed(_) => fallback,
        }
    }

    pub fn malformed(&self) -> Option<&MalformedResponse> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::Malformed(m) => Some(m),
        }
    }
}

/// Remove surrounding whitespace and one enclosing Markdown code fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim(),
        None => body.trim(),
    }
}

/// Parse a reply as `T`.
///
/// The body may be wrapped in a code fence. Nothing else is repaired: any
/// other deviation from `T`'s shape yields [`ParseOutcome::Malformed`] and is
/// logged at `warn` with the raw text.
pub fn parse_json<T: DeserializeOwned>(step: &str, raw: &str) -> ParseOutcome<T> {
    match serde_json::from_str::<T>(strip_code_fence(raw)) {
        Ok(v) => ParseOutcome::Parsed(v),
        Err(e) => malformed(step, e.to_string(), raw),
    }
}

/// Parse a reply expected to be a JSON list of `T`.
///
/// Also accepts an object with exactly one member whose value is that list
/// (`{"patterns": [...]}`), a common envelope from JSON-mode models.
pub fn parse_json_list<T: DeserializeOwned>(step: &str, raw: &str) -> ParseOutcome<Vec<T>> {
    let value = match serde_json::from_str::<serde_json::Value>(strip_code_fence(raw)) {
        Ok(v) => v,
        Err(e) => return malformed(step, e.to_string(), raw),
    };
    let list = match value {
        serde_json::Value::Array(items) => serde_json::Value::Array(items),
        serde_json::Value::Object(mut map) if map.len() == 1 => {
            match map.values_mut().next().map(serde_json::Value::take) {
                Some(inner @ serde_json::Value::Array(_)) => inner,
                _ => return malformed(step, "object envelope does not hold a list".to_string(), raw),
            }
        }
        other => {
            return malformed(step, format!("expected a JSON list, got {}", json_kind(&other)), raw)
        }
    };
    match serde_json::from_value::<Vec<T>>(list) {
        Ok(items) => ParseOutcome::Parsed(items),
        Err(e) => malformed(step, e.to_string(), raw),
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

fn malformed<T>(step: &str, detail: String, raw: &str) -> ParseOutcome<T> {
    ParseOutcome::Malformed(malformed_response(step, detail, raw))
}

/// Record an unreadable reply, logging it at `warn` with the raw text.
pub(crate) fn malformed_response(step: &str, detail: String, raw: &str) -> MalformedResponse {
    tracing::warn!(
        target: "rca_catalog::response",
        step,
        detail = %detail,
        raw = %raw,
        "could not parse service reply; continuing with an empty result"
    );
    MalformedResponse {
        step: step.to_string(),
        detail,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[rstest]
    #[case("[1]", "[1]")]
    #[case("  [1]\n", "[1]")]
    #[case("```json\n[1]\n```", "[1]")]
    #[case("```\n[1]\n```", "[1]")]
    #[case("```[1]```", "[1]")]
    #[case("```json\n[1]", "```json\n[1]")]
    #[case("Here you go: [1]", "Here you go: [1]")]
    fn test_strip_code_fence(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(strip_code_fence(raw), expected);
    }

    #[test]
    fn test_parse_list_plain() {
        let out: ParseOutcome<Vec<Item>> = parse_json_list("t", r#"[{"name":"a"},{"name":"b"}]"#);
        assert_eq!(
            out,
            ParseOutcome::Parsed(vec![Item { name: "a".into() }, Item { name: "b".into() }])
        );
    }

    #[test]
    fn test_parse_list_fenced() {
        let out: ParseOutcome<Vec<Item>> =
            parse_json_list("t", "```json\n[{\"name\":\"a\"}]\n```");
        assert!(out.is_parsed());
    }

    #[test]
    fn test_parse_list_single_key_envelope() {
        let out: ParseOutcome<Vec<Item>> = parse_json_list("t", r#"{"patterns":[{"name":"a"}]}"#);
        assert_eq!(out, ParseOutcome::Parsed(vec![Item { name: "a".into() }]));
    }

    #[rstest]
    #[case("not json")]
    #[case("")]
    #[case(r#"{"a":[{"name":"x"}],"b":[]}"#)]
    #[case(r#"{"patterns":"none"}"#)]
    #[case(r#"{"name":"a"}"#)]
    #[case("42")]
    #[case(r#"[{"nom":"a"}]"#)]
    #[case(r#"[{"name":"a"}, 3]"#)]
    fn test_parse_list_malformed_keeps_raw(#[case] raw: &str) {
        let out: ParseOutcome<Vec<Item>> = parse_json_list("pattern synthesis", raw);
        let m = out.malformed().expect("malformed");
        assert_eq!(m.raw, raw);
        assert_eq!(m.step, "pattern synthesis");
        assert!(!m.detail.is_empty());
    }

    #[test]
    fn test_unwrap_or_falls_back() {
        let out: ParseOutcome<Vec<Item>> = parse_json_list("t", "garbage");
        assert!(out.unwrap_or(Vec::new()).is_empty());
    }

    #[test]
    fn test_parse_json_object() {
        let out: ParseOutcome<Item> = parse_json("t", "```json\n{\"name\":\"z\"}\n```");
        assert_eq!(out, ParseOutcome::Parsed(Item { name: "z".into() }));
        let bad: ParseOutcome<Item> = parse_json("t", "[]");
        assert!(!bad.is_parsed());
    }
}
