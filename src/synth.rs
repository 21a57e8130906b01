//! Pattern and prevention synthesis.
//!
//! Both steps are one prompt to the text-generation service followed by a
//! structural parse of the reply. A reply that does not parse degrades to an
//! empty list; a service that cannot be reached aborts the run.

use crate::error::Result;
use crate::llm::TextGenerator;
use crate::response::{parse_json_list, ParseOutcome};
use serde::{Deserialize, Deserializer, Serialize};

pub const PATTERN_STEP: &str = "pattern synthesis";
pub const PREVENTION_STEP: &str = "prevention synthesis";

pub const FIX_TYPES: [&str; 5] = [
    "Process Fix",
    "Automation Fix",
    "Code Fix",
    "Infra Fix",
    "Monitoring Fix",
];

// ---------------------------------------------------------------------------
// Candidate records
// ---------------------------------------------------------------------------

/// A pattern proposed by the service for the current run.
///
/// `pattern` and `examples` are required; a reply item without them makes the
/// whole reply malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePattern {
    pub pattern: String,
    pub examples: Vec<String>,
    /// Service's own count. Not trusted; frequencies are recomputed.
    #[serde(default, deserialize_with = "lenient_count")]
    pub frequency: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: String,
}

impl CandidatePattern {
    pub fn new(pattern: impl Into<String>, examples: Vec<String>, category: impl Into<String>) -> Self {
        let frequency = Some(examples.len() as u64);
        Self {
            pattern: pattern.into(),
            examples,
            frequency,
            category: category.into(),
        }
    }
}

/// Prevention guidance for one candidate, keyed by pattern name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePrevention {
    pub pattern: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub root_cause: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fix_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub prevention_step: String,
}

/// Accept a count written as a number, a numeric string or null.
fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accept text fields given as null; other scalars are rendered as text.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Prompt asking the service to group new fail reasons into patterns.
pub fn cluster_prompt(new_reasons: &[String]) -> String {
    // A JSON list keeps quotes and commas inside reasons unambiguous.
    let listed = serde_json::to_string(new_reasons).unwrap_or_default();
    format!(
        r#"You are analyzing new RCA failure reasons from production deployments.

Here is the list of NEW failure reasons:
{listed}

Your task:
1. Group them into patterns.
2. For each pattern, provide:
   - Pattern Name
   - Example Reasons (copied exactly from the list above)
   - Frequency Count (number of items in examples)
   - Suggested Category (Infra, Code, Config, Security, Process, External Dependency, Other)

Return JSON list with fields:
[{{"pattern": "...", "examples": [...], "frequency": n, "category": "..."}}]

Only return the JSON, no other text."#
    )
}

/// Prompt asking the service for prevention guidance per candidate.
pub fn prevention_prompt(candidates: &[CandidatePattern]) -> String {
    let listed = serde_json::to_string_pretty(candidates).unwrap_or_default();
    format!(
        r#"You are an RCA prevention advisor.

Given these new failure patterns:
{listed}

For each pattern, suggest:
- Root Cause
- Recommended Fix Type ({fix_types})
- Prevention Step

Return JSON list with fields:
[{{"pattern": "...", "root_cause": "...", "fix_type": "...", "prevention_step": "..."}}]

Only return the JSON, no other text."#,
        fix_types = FIX_TYPES.join(", ")
    )
}

// ---------------------------------------------------------------------------
// Synthesizers
// ---------------------------------------------------------------------------

/// Groups unknown fail reasons into candidate patterns.
pub struct PatternSynthesizer<'a> {
    generator: &'a dyn TextGenerator,
    model: &'a str,
}

impl<'a> PatternSynthesizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator, model: &'a str) -> Self {
        Self { generator, model }
    }

    /// One service call; no retry.
    pub async fn synthesize(&self, new_reasons: &[String]) -> Result<ParseOutcome<Vec<CandidatePattern>>> {
        let raw = self
            .generator
            .generate(&cluster_prompt(new_reasons), self.model)
            .await?;
        let outcome = parse_json_list::<CandidatePattern>(PATTERN_STEP, &raw);
        if let ParseOutcome::Parsed(candidates) = &outcome {
            tracing::info!(
                target: "rca_catalog::synth",
                candidates = candidates.len(),
                names = ?candidates.iter().map(|c| c.pattern.as_str()).collect::<Vec<_>>(),
                "pattern synthesis complete"
            );
        }
        Ok(outcome)
    }
}

/// Annotates candidate patterns with root cause, fix type and prevention step.
pub struct PreventionSynthesizer<'a> {
    generator: &'a dyn TextGenerator,
    model: &'a str,
}

impl<'a> PreventionSynthesizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator, model: &'a str) -> Self {
        Self { generator, model }
    }

    /// One service call; no retry.
    pub async fn synthesize(
        &self,
        candidates: &[CandidatePattern],
    ) -> Result<ParseOutcome<Vec<CandidatePrevention>>> {
        let raw = self
            .generator
            .generate(&prevention_prompt(candidates), self.model)
            .await?;
        let outcome = parse_json_list::<CandidatePrevention>(PREVENTION_STEP, &raw);
        if let ParseOutcome::Parsed(annotations) = &outcome {
            tracing::info!(
                target: "rca_catalog::synth",
                annotations = annotations.len(),
                "prevention synthesis complete"
            );
        }
        Ok(outcome)
    }
}

/// First annotation whose name equals `pattern` exactly.
pub fn find_prevention<'p>(
    annotations: &'p [CandidatePrevention],
    pattern: &str,
) -> Option<&'p CandidatePrevention> {
    annotations.iter().find(|a| a.pattern == pattern)
}
