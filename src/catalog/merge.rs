//! Folding candidate patterns into the catalog.
//!
//! Merging never removes a row and never drops an example string. Under the
//! default [`MergePolicy::Append`] every candidate becomes a new row, even if
//! a row with the same name already exists.

use super::{Catalog, ExamplesField, PatternRecord};
use crate::synth::{find_prevention, CandidatePattern, CandidatePrevention};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How a candidate whose name is already in the catalog is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Append one row per candidate; no name check.
    #[default]
    Append,
    /// Extend the first row with the same name and readable examples
    /// instead of appending.
    UpsertByName,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePolicy::Append => write!(f, "append"),
            MergePolicy::UpsertByName => write!(f, "upsert-by-name"),
        }
    }
}

/// What a merge did to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub appended: usize,
    pub updated: usize,
    /// Candidates that had no annotation with an exactly equal name.
    pub unannotated: Vec<String>,
}

/// Build the catalog row for one candidate.
///
/// The candidate's own frequency is not carried over; it is recomputed.
pub fn record_from_candidate(
    candidate: &CandidatePattern,
    annotation: Option<&CandidatePrevention>,
) -> PatternRecord {
    let mut record = PatternRecord::new(
        candidate.pattern.clone(),
        candidate.examples.clone(),
        candidate.category.clone(),
    );
    if let Some(a) = annotation {
        record.root_cause = a.root_cause.clone();
        record.fix_type = a.fix_type.clone();
        record.prevention_step = a.prevention_step.clone();
    }
    record
}

/// Merge `candidates` with their `annotations` into `catalog`.
pub fn merge(
    catalog: &mut Catalog,
    candidates: &[CandidatePattern],
    annotations: &[CandidatePrevention],
    policy: MergePolicy,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for candidate in candidates {
        let annotation = find_prevention(annotations, &candidate.pattern);
        if annotation.is_none() {
            outcome.unannotated.push(candidate.pattern.clone());
        }
        let record = record_from_candidate(candidate, annotation);

        let existing = match policy {
            MergePolicy::Append => None,
            MergePolicy::UpsertByName => catalog.position_readable(&record.name),
        };
        let upserted = match existing {
            Some(idx) => upsert_into(&mut catalog.records_mut()[idx], &record),
            None => false,
        };
        if upserted {
            tracing::debug!(
                target: "rca_catalog::merge",
                pattern = %candidate.pattern,
                "extended existing row"
            );
            outcome.updated += 1;
        } else {
            tracing::debug!(
                target: "rca_catalog::merge",
                pattern = %candidate.pattern,
                examples = candidate.examples.len(),
                "appended row"
            );
            catalog.push(record);
            outcome.appended += 1;
        }
    }
    outcome
}

/// Union `incoming` into `row`. Returns false when `row`'s examples are
/// corrupt, in which case nothing is changed and the caller appends.
fn upsert_into(row: &mut PatternRecord, incoming: &PatternRecord) -> bool {
    let merged = match &row.examples {
        ExamplesField::Corrupt(_) => return false,
        ExamplesField::List(current) => ExamplesField::from_examples(
            current.iter().chain(incoming.examples.as_slice()).cloned(),
        ),
        ExamplesField::Missing => incoming.examples.clone(),
    };
    row.examples = merged;
    fill_if_empty(&mut row.category, &incoming.category);
    fill_if_empty(&mut row.root_cause, &incoming.root_cause);
    fill_if_empty(&mut row.fix_type, &incoming.fix_type);
    fill_if_empty(&mut row.prevention_step, &incoming.prevention_step);
    true
}

fn fill_if_empty(slot: &mut String, value: &str) {
    if slot.trim().is_empty() {
        *slot = value.to_string();
    }
}
