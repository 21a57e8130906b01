//! Terminal rendering of run summaries, catalog overviews and diff verdicts.

use crate::catalog::Catalog;
use crate::diff_matcher::{DiffReport, DiffVerdict};
use crate::pipeline::RunSummary;
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One row of the overview table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewRow {
    pub pattern: String,
    pub category: String,
    pub frequency: u64,
    pub examples: usize,
    pub fix_type: String,
}

/// Summed frequency of every pattern in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub patterns: usize,
    pub frequency: u64,
}

/// Patterns by frequency and totals by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogOverview {
    pub rows: Vec<OverviewRow>,
    pub categories: Vec<CategoryTotal>,
}

impl CatalogOverview {
    /// Rows are sorted by frequency, highest first; ties keep catalog order.
    /// Categories are grouped on their normalised label and sorted the same
    /// way, ties by label.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut rows: Vec<OverviewRow> = catalog
            .records()
            .iter()
            .map(|r| OverviewRow {
                pattern: r.name.clone(),
                category: r.category_kind().to_string(),
                frequency: r.frequency,
                examples: r.examples.as_slice().len(),
                fix_type: r.fix_type.clone(),
            })
            .collect();
        rows.sort_by(|a, b| b.frequency.cmp(&a.frequency));

        let mut grouped: BTreeMap<String, (usize, u64)> = BTreeMap::new();
        for row in &rows {
            let entry = grouped.entry(row.category.clone()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += row.frequency;
        }
        let mut categories: Vec<CategoryTotal> = grouped
            .into_iter()
            .map(|(category, (patterns, frequency))| CategoryTotal { category, patterns, frequency })
            .collect();
        categories.sort_by(|a, b| b.frequency.cmp(&a.frequency));

        Self { rows, categories }
    }

    pub fn total_frequency(&self) -> u64 {
        self.rows.iter().map(|r| r.frequency).sum()
    }
}

fn rule() -> ColoredString {
    "=".repeat(60).bright_blue()
}

pub fn render_overview(overview: &CatalogOverview) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "CATALOG OVERVIEW".bright_cyan().bold());
    let _ = writeln!(out, "{}", rule());
    if overview.rows.is_empty() {
        let _ = writeln!(out, "{}", "Catalog is empty.".dimmed());
        return out;
    }
    let _ = writeln!(
        out,
        "{:>6}  {:<32} {:<20} {:>8}  {}",
        "Freq".bright_yellow(),
        "Pattern".bright_yellow(),
        "Category".bright_yellow(),
        "Examples".bright_yellow(),
        "Fix type".bright_yellow()
    );
    for row in &overview.rows {
        let freq = format!("{:>6}", row.frequency);
        let freq = if row.frequency > 0 { freq.green().bold() } else { freq.normal() };
        let _ = writeln!(
            out,
            "{}  {:<32} {:<20} {:>8}  {}",
            freq, row.pattern, row.category, row.examples, row.fix_type
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "By category".bright_cyan());
    for cat in &overview.categories {
        let _ = writeln!(
            out,
            "  {:<24} {:>6}  ({} patterns)",
            cat.category, cat.frequency, cat.patterns
        );
    }
    out
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "RCA CATALOG RUN".bright_cyan().bold());
    let _ = writeln!(out, "{}: {}", "Run".bright_yellow(), summary.run_id);
    let _ = writeln!(out, "{}", rule());
    let lines = [
        ("Fail reasons in report", summary.batch_size),
        ("Already known", summary.known),
        ("New", summary.new),
        ("Candidate patterns", summary.candidates),
        ("Prevention annotations", summary.annotations),
        ("Rows appended", summary.appended),
        ("Rows extended", summary.updated),
        ("Rows in catalog", summary.total_rows),
    ];
    for (label, value) in lines {
        let _ = writeln!(out, "{:<24} {}", format!("{}:", label), value);
    }
    if !summary.corrupt_rows.is_empty() {
        let _ = writeln!(
            out,
            "{} rows {:?} have unreadable examples",
            "warning:".yellow().bold(),
            summary.corrupt_rows
        );
    }
    if !summary.uncovered_reasons.is_empty() {
        let _ = writeln!(
            out,
            "{} not covered by any new pattern: {:?}",
            "warning:".yellow().bold(),
            summary.uncovered_reasons
        );
    }
    for m in &summary.malformed {
        let _ = writeln!(
            out,
            "{} could not parse {} reply ({}). Raw output:",
            "warning:".yellow().bold(),
            m.step,
            m.detail
        );
        let _ = writeln!(out, "{}", m.raw.dimmed());
    }
    out
}

pub fn render_diff_report(report: &DiffReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "DIFF ANALYSIS".bright_cyan().bold());
    let _ = writeln!(out, "{}: {}", "Changed lines".bright_yellow(), report.changed_lines);
    let _ = writeln!(out, "{}", rule());
    match &report.verdict {
        DiffVerdict::Fine => {
            let _ = writeln!(out, "{}", "Everything looks fine".green().bold());
        }
        DiffVerdict::Issues { issues } => {
            let _ = writeln!(out, "{}", format!("{} issue(s) found", issues.len()).red().bold());
            for issue in issues {
                let pattern = if issue.known_pattern {
                    issue.pattern.bright_yellow()
                } else {
                    format!("{} (not a known pattern)", issue.pattern).yellow()
                };
                let _ = writeln!(out, "- {}", pattern);
                let _ = writeln!(out, "    {}", issue.code_snippet.bright_white());
                let _ = writeln!(out, "    {}", issue.reason);
            }
        }
        DiffVerdict::Unparsed(m) => {
            let _ = writeln!(out, "{} ({}). Raw output:", "Could not parse reply".yellow().bold(), m.detail);
            let _ = writeln!(out, "{}", m.raw);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PatternRecord;
    use crate::diff_matcher::DiffIssue;
    use crate::response::MalformedResponse;

    fn record(name: &str, category: &str, frequency: u64) -> PatternRecord {
        let mut r = PatternRecord::new(name, vec![format!("{} example", name)], category);
        r.frequency = frequency;
        r
    }

    fn catalog() -> Catalog {
        Catalog::from_records(vec![
            record("Config Issues", "Config", 1),
            record("DB Issues", "Infra", 2),
            record("Disk", "infra", 3),
            record("Quiet", "Code", 0),
            record("Flaky", "Networking", 0),
        ])
    }

    #[test]
    fn test_rows_sorted_by_frequency_desc_stable() {
        let o = CatalogOverview::from_catalog(&catalog());
        let names: Vec<&str> = o.rows.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(names, vec!["Disk", "DB Issues", "Config Issues", "Quiet", "Flaky"]);
        assert_eq!(o.total_frequency(), 6);
    }

    #[test]
    fn test_category_totals_normalise_labels() {
        let o = CatalogOverview::from_catalog(&catalog());
        assert_eq!(
            o.categories[0],
            CategoryTotal { category: "Infra".into(), patterns: 2, frequency: 5 }
        );
        assert_eq!(o.categories[1].category, "Config");
        assert!(o.categories.iter().any(|c| c.category == "Networking"));
    }

    #[test]
    fn test_render_overview_empty() {
        let text = render_overview(&CatalogOverview::default());
        assert!(text.contains("Catalog is empty."));
    }

    #[test]
    fn test_render_overview_lists_patterns() {
        let text = render_overview(&CatalogOverview::from_catalog(&catalog()));
        assert!(text.contains("DB Issues"));
        assert!(text.contains("By category"));
    }

    #[test]
    fn test_render_summary_shows_raw_malformed() {
        let summary = RunSummary {
            run_id: "r1".into(),
            malformed: vec![MalformedResponse {
                step: "pattern synthesis".into(),
                detail: "expected value".into(),
                raw: "sorry, no JSON".into(),
            }],
            uncovered_reasons: vec!["Disk full".into()],
            ..RunSummary::default()
        };
        let text = render_summary(&summary);
        assert!(text.contains("pattern synthesis"));
        assert!(text.contains("sorry, no JSON"));
        assert!(text.contains("Disk full"));
    }

    #[test]
    fn test_render_diff_report_marks_unknown_patterns() {
        let report = DiffReport {
            changed_lines: 2,
            verdict: DiffVerdict::Issues {
                issues: vec![DiffIssue {
                    code_snippet: "x = null".into(),
                    pattern: "Made Up".into(),
                    reason: "r".into(),
                    known_pattern: false,
                }],
            },
        };
        let text = render_diff_report(&report);
        assert!(text.contains("Made Up (not a known pattern)"));
        assert!(text.contains("1 issue(s) found"));
    }
}
