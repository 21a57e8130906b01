//! # Module: pipeline
//!
//! One reconciliation run of an input batch against the stored catalog:
//!
//! ```text
//! load → index → classify ─┬─ (no new) ────────────────────────────┐
//!                          └─ pattern synth → prevention synth → merge
//!                                                                  ↓
//!                                              recompute frequency → save
//! ```
//!
//! Service calls are awaited strictly in order. A reply that cannot be parsed
//! degrades that step to an empty result and the run continues. A service
//! that cannot be reached aborts the run before anything is saved.

use crate::batch::InputBatch;
use crate::catalog::frequency;
use crate::catalog::membership::MembershipIndex;
use crate::catalog::merge::{self, MergePolicy};
use crate::catalog::store::CatalogStore;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::llm::TextGenerator;
use crate::response::{MalformedResponse, ParseOutcome};
use crate::synth::{CandidatePattern, PatternSynthesizer, PreventionSynthesizer};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Counts and diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub batch_size: usize,
    pub known: usize,
    pub new: usize,
    pub candidates: usize,
    pub annotations: usize,
    pub appended: usize,
    pub updated: usize,
    pub total_rows: usize,
    pub total_frequency: u64,
    /// Rows whose stored examples could not be read.
    pub corrupt_rows: Vec<usize>,
    /// Candidates merged without prevention guidance.
    pub unannotated: Vec<String>,
    /// New reasons not placed in any candidate; distinct, batch order.
    pub uncovered_reasons: Vec<String>,
    /// Raw replies that could not be parsed, in call order.
    pub malformed: Vec<MalformedResponse>,
}

/// A finished run: the summary and the catalog as saved.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub catalog: Catalog,
}

pub struct CatalogPipeline<'a> {
    store: &'a dyn CatalogStore,
    generator: &'a dyn TextGenerator,
    model: String,
    policy: MergePolicy,
}

impl<'a> CatalogPipeline<'a> {
    pub fn new(store: &'a dyn CatalogStore, generator: &'a dyn TextGenerator, model: impl Into<String>) -> Self {
        Self {
            store,
            generator,
            model: model.into(),
            policy: MergePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Reconcile `batch` with the stored catalog and save the result.
    ///
    /// The store is read once and written once. On `Err` nothing was written.
    pub async fn run(&self, batch: &InputBatch) -> Result<RunOutcome> {
        let mut summary = RunSummary {
            run_id: Uuid::new_v4().to_string(),
            batch_size: batch.len(),
            ..RunSummary::default()
        };

        let mut catalog = self.store.load()?;
        summary.corrupt_rows = catalog.corrupt_rows();
        tracing::info!(
            target: "rca_catalog::pipeline",
            run_id = %summary.run_id,
            rows = catalog.len(),
            corrupt_rows = summary.corrupt_rows.len(),
            batch_size = batch.len(),
            "catalog loaded"
        );

        let index = MembershipIndex::build(&catalog);
        let classification = index.classify(batch);
        summary.known = classification.known.len();
        summary.new = classification.new.len();
        tracing::info!(
            target: "rca_catalog::pipeline",
            known = summary.known,
            new = summary.new,
            "batch classified"
        );

        if classification.has_new() {
            let candidates = self.synthesize_patterns(&classification.new, &mut summary).await?;
            summary.candidates = candidates.len();

            let annotations = if candidates.is_empty() {
                Vec::new()
            } else {
                let outcome = PreventionSynthesizer::new(self.generator, &self.model)
                    .synthesize(&candidates)
                    .await?;
                recover(outcome, &mut summary.malformed)
            };
            summary.annotations = annotations.len();

            let merged = merge::merge(&mut catalog, &candidates, &annotations, self.policy);
            summary.appended = merged.appended;
            summary.updated = merged.updated;
            summary.unannotated = merged.unannotated;
            summary.uncovered_reasons = uncovered(&classification.new, &candidates);
            tracing::info!(
                target: "rca_catalog::pipeline",
                policy = %self.policy,
                appended = summary.appended,
                updated = summary.updated,
                "candidates merged"
            );
            if !summary.uncovered_reasons.is_empty() {
                tracing::warn!(
                    target: "rca_catalog::pipeline",
                    uncovered = ?summary.uncovered_reasons,
                    "new fail reasons not covered by any candidate pattern"
                );
            }
        } else {
            tracing::info!(
                target: "rca_catalog::pipeline",
                "no new fail reasons; skipping synthesis"
            );
        }

        summary.total_frequency = frequency::recompute(&mut catalog, batch);
        self.store.save(&catalog)?;
        summary.total_rows = catalog.len();
        tracing::info!(
            target: "rca_catalog::pipeline",
            run_id = %summary.run_id,
            rows = summary.total_rows,
            total_frequency = summary.total_frequency,
            malformed = summary.malformed.len(),
            "catalog saved"
        );

        Ok(RunOutcome { summary, catalog })
    }

    async fn synthesize_patterns(
        &self,
        new_reasons: &[String],
        summary: &mut RunSummary,
    ) -> Result<Vec<CandidatePattern>> {
        let outcome = PatternSynthesizer::new(self.generator, &self.model)
            .synthesize(new_reasons)
            .await?;
        Ok(recover(outcome, &mut summary.malformed))
    }
}

fn recover<T>(outcome: ParseOutcome<Vec<T>>, malformed: &mut Vec<MalformedResponse>) -> Vec<T> {
    match outcome {
        ParseOutcome::Parsed(items) => items,
        ParseOutcome::Malformed(m) => {
            malformed.push(m);
            Vec::new()
        }
    }
}

/// Distinct reasons in `new_reasons` that no candidate lists as an example.
fn uncovered(new_reasons: &[String], candidates: &[CandidatePattern]) -> Vec<String> {
    let covered: HashSet<&str> = candidates
        .iter()
        .flat_map(|c| c.examples.iter().map(String::as_str))
        .collect();
    let mut seen = HashSet::new();
    new_reasons
        .iter()
        .filter(|r| !covered.contains(r.as_str()) && seen.insert(r.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::MemoryCatalogStore;
    use crate::catalog::PatternRecord;
    use crate::llm::ScriptedGenerator;

    #[test]
    fn test_uncovered_distinct_in_order() {
        let new = vec!["b".to_string(), "a".to_string(), "b".to_string(), "c".to_string()];
        let candidates = vec![CandidatePattern::new("P", vec!["a".into()], "Code")];
        assert_eq!(uncovered(&new, &candidates), vec!["b", "c"]);
    }

    #[test]
    fn test_recover_collects_malformed() {
        let mut sink = Vec::new();
        let items: Vec<u8> = recover(
            crate::response::parse_json_list("pattern synthesis", "nope"),
            &mut sink,
        );
        assert!(items.is_empty());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].raw, "nope");
    }

    #[tokio::test]
    async fn test_run_without_new_reasons_makes_no_calls() {
        let mut catalog = Catalog::new();
        let mut r = PatternRecord::new("DB Issues", vec!["DB Timeout".into()], "Infra");
        r.frequency = 7;
        catalog.push(r);
        let store = MemoryCatalogStore::with_catalog(catalog);
        let generator = ScriptedGenerator::new();

        let outcome = CatalogPipeline::new(&store, &generator, "m")
            .run(&InputBatch::new(["DB Timeout"]))
            .await
            .expect("run");

        assert_eq!(generator.calls(), 0);
        assert_eq!(outcome.summary.known, 1);
        assert_eq!(outcome.summary.new, 0);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot().records()[0].frequency, 1);
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_prevention_call() {
        let store = MemoryCatalogStore::new();
        let generator = ScriptedGenerator::with_replies(["[]"]);

        let outcome = CatalogPipeline::new(&store, &generator, "m")
            .run(&InputBatch::new(["Disk full"]))
            .await
            .expect("run");

        assert_eq!(generator.calls(), 1);
        assert_eq!(outcome.summary.candidates, 0);
        assert_eq!(outcome.summary.uncovered_reasons, vec!["Disk full"]);
        assert!(outcome.summary.malformed.is_empty());
    }

    #[tokio::test]
    async fn test_policy_is_applied() {
        let mut catalog = Catalog::new();
        catalog.push(PatternRecord::new("Disk", vec!["Disk full".into()], "Infra"));
        let store = MemoryCatalogStore::with_catalog(catalog);
        let generator = ScriptedGenerator::with_replies([
            r#"[{"pattern":"Disk","examples":["Disk quota"],"category":"Infra"}]"#,
            r#"[]"#,
        ]);

        let pipeline =
            CatalogPipeline::new(&store, &generator, "m").with_policy(MergePolicy::UpsertByName);
        assert_eq!(pipeline.policy(), MergePolicy::UpsertByName);
        let outcome = pipeline.run(&InputBatch::new(["Disk quota"])).await.expect("run");

        assert_eq!(outcome.summary.updated, 1);
        assert_eq!(outcome.catalog.len(), 1);
        assert_eq!(outcome.catalog.records()[0].examples.as_slice(), &["Disk full", "Disk quota"]);
        assert_eq!(outcome.catalog.records()[0].frequency, 1);
        assert_eq!(outcome.summary.unannotated, vec!["Disk"]);
    }
}
