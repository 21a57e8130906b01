//! Diff Pattern Matcher.
//!
//! Maps risky lines of a unified diff onto a list of known failure patterns.
//! Independent of the catalog: it reads no store and writes none.

use crate::error::Result;
use crate::llm::TextGenerator;
use crate::response::{malformed_response, parse_json, strip_code_fence, MalformedResponse, ParseOutcome};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DIFF_STEP: &str = "diff analysis";

/// Plain-text reply the service may give instead of JSON when the diff is safe.
pub const FINE_MARKER: &str = "Everything looks fine";

/// A failure pattern the diff is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownPattern {
    pub pattern: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub category: String,
}

impl KnownPattern {
    pub fn new(pattern: &str, examples: &[&str], category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
            category: category.to_string(),
        }
    }
}

static BUILTIN_PATTERNS: Lazy<Vec<KnownPattern>> = Lazy::new(|| {
    vec![
        KnownPattern::new("DB Connection Issues", &["DB Timeout", "DB not reachable"], "Infra"),
        KnownPattern::new("Config Errors", &["YAML error", "Config mismatch"], "Config"),
        KnownPattern::new("Permission Issues", &["Unauthorized access", "Role missing"], "Security"),
        KnownPattern::new("Code NullPointer", &["NullPointerException"], "Code"),
    ]
});

/// Default pattern list used when none is supplied.
pub fn builtin_patterns() -> &'static [KnownPattern] {
    &BUILTIN_PATTERNS
}

/// Read a pattern list from a JSON file (`[{"pattern", "examples", "category"}]`).
pub fn load_patterns(path: &Path) -> Result<Vec<KnownPattern>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Added and removed lines of a unified diff, markers kept.
///
/// `---`/`+++` lines are file headers outside a hunk, or when they form a
/// `--- ` / `+++ ` pair right before a `@@` line. Inside a hunk any other
/// such line is a real change (`-- x` removed shows as `--- x`).
pub fn changed_lines(diff: &str) -> Vec<&str> {
    let lines: Vec<&str> = diff.lines().collect();
    let mut changed = Vec::new();
    let mut in_hunk = false;
    let mut i = 0;
    while i < lines.len() {
        if opens_file_header(&lines[i..]) {
            in_hunk = false;
            i += 2;
            continue;
        }
        let line = lines[i];
        i += 1;
        if line.starts_with("@@") {
            in_hunk = true;
        } else if line.starts_with("diff ") {
            in_hunk = false;
        } else if !in_hunk && (line.starts_with("---") || line.starts_with("+++")) {
            continue;
        } else if line.starts_with('+') || line.starts_with('-') {
            changed.push(line);
        }
    }
    changed
}

fn opens_file_header(rest: &[&str]) -> bool {
    matches!(
        rest,
        [old, new, hunk, ..]
            if old.starts_with("--- ") && new.starts_with("+++ ") && hunk.starts_with("@@")
    )
}

pub fn diff_prompt(patterns: &[KnownPattern], diff: &str) -> String {
    let listed = serde_json::to_string_pretty(patterns).unwrap_or_default();
    format!(
        r#"We have the following known failure patterns:
{listed}

Now analyze this code diff:
{diff}

Tasks:
1. If everything looks fine, respond: "{fine}".
2. If risks exist:
   - Identify the risky code changes.
   - Map them to one or more of the failure patterns above.
   - Highlight why that change could lead to the mapped failure.

Return structured JSON with fields:
- status: "fine" or "issues"
- issues: [{{"code_snippet": "...", "pattern": "...", "reason": "..."}}]"#,
        fine = FINE_MARKER
    )
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// One risky change mapped to a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffIssue {
    pub code_snippet: String,
    pub pattern: String,
    pub reason: String,
    /// Whether `pattern` names one of the patterns the diff was checked against.
    pub known_pattern: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DiffVerdict {
    Fine,
    Issues { issues: Vec<DiffIssue> },
    /// The reply could not be read; nothing is concluded.
    Unparsed(MalformedResponse),
}

impl DiffVerdict {
    pub fn issues(&self) -> &[DiffIssue] {
        match self {
            DiffVerdict::Issues { issues } => issues,
            DiffVerdict::Fine | DiffVerdict::Unparsed(_) => &[],
        }
    }
}

/// Result of one [`DiffMatcher::analyze`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub changed_lines: usize,
    pub verdict: DiffVerdict,
}

#[derive(Debug, Deserialize)]
struct VerdictReply {
    status: String,
    #[serde(default)]
    issues: Vec<IssueReply>,
}

#[derive(Debug, Deserialize)]
struct IssueReply {
    #[serde(default)]
    code_snippet: String,
    pattern: String,
    #[serde(default)]
    reason: String,
}

/// Interpret a raw service reply against `patterns`.
pub fn read_verdict(raw: &str, patterns: &[KnownPattern]) -> DiffVerdict {
    if is_plain_fine(strip_code_fence(raw)) {
        return DiffVerdict::Fine;
    }
    let reply = match parse_json::<VerdictReply>(DIFF_STEP, raw) {
        ParseOutcome::Parsed(reply) => reply,
        ParseOutcome::Malformed(m) => return DiffVerdict::Unparsed(m),
    };
    match reply.status.trim().to_lowercase().as_str() {
        "fine" => DiffVerdict::Fine,
        "issues" => DiffVerdict::Issues {
            issues: reply
                .issues
                .into_iter()
                .map(|i| DiffIssue {
                    known_pattern: patterns.iter().any(|p| p.pattern == i.pattern),
                    code_snippet: i.code_snippet,
                    pattern: i.pattern,
                    reason: i.reason,
                })
                .collect(),
        },
        other => DiffVerdict::Unparsed(malformed_response(
            DIFF_STEP,
            format!("unknown status {:?}", other),
            raw,
        )),
    }
}

/// The reply is the fine marker alone, allowing leading symbols (an emoji,
/// quotes) and trailing punctuation. Anything qualifying it is not fine.
fn is_plain_fine(body: &str) -> bool {
    let text = body.trim_start_matches(|c: char| !c.is_alphanumeric());
    match text.get(..FINE_MARKER.len()) {
        Some(head) if head.eq_ignore_ascii_case(FINE_MARKER) => text[FINE_MARKER.len()..]
            .chars()
            .all(|c| c.is_whitespace() || c.is_ascii_punctuation()),
        _ => false,
    }
}

pub struct DiffMatcher<'a> {
    generator: &'a dyn TextGenerator,
    model: &'a str,
    patterns: &'a [KnownPattern],
}

impl<'a> DiffMatcher<'a> {
    pub fn new(generator: &'a dyn TextGenerator, model: &'a str, patterns: &'a [KnownPattern]) -> Self {
        Self { generator, model, patterns }
    }

    /// Ask the service for a verdict on `diff`.
    ///
    /// A diff with no changed lines is fine without a service call. A reply
    /// that cannot be read yields [`DiffVerdict::Unparsed`]; transport
    /// failures are returned as `Err`.
    pub async fn analyze(&self, diff: &str) -> Result<DiffReport> {
        let changed = changed_lines(diff).len();
        if changed == 0 {
            tracing::info!(target: "rca_catalog::diff", "diff has no changed lines");
            return Ok(DiffReport { changed_lines: 0, verdict: DiffVerdict::Fine });
        }
        let raw = self
            .generator
            .generate(&diff_prompt(self.patterns, diff), self.model)
            .await?;
        let verdict = read_verdict(&raw, self.patterns);
        tracing::info!(
            target: "rca_catalog::diff",
            changed_lines = changed,
            issues = verdict.issues().len(),
            unknown_patterns = verdict.issues().iter().filter(|i| !i.known_pattern).count(),
            "diff analysed"
        );
        Ok(DiffReport { changed_lines: changed, verdict })
    }
}
