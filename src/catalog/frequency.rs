//! Frequency recomputation.
//!
//! A record's frequency is the number of batch entries, repeats included,
//! that appear among its examples. It reflects the latest batch only and is
//! never accumulated across runs.

use super::Catalog;
use crate::batch::InputBatch;
use std::collections::HashSet;

/// Overwrite every record's frequency against `batch`.
///
/// Rows with missing or corrupt `examples` are set to 0. Returns the total of
/// all assigned frequencies.
pub fn recompute(catalog: &mut Catalog, batch: &InputBatch) -> u64 {
    let counts = batch.counts();
    let mut total = 0;
    for record in catalog.records_mut() {
        let distinct: HashSet<&str> = record.examples.as_slice().iter().map(String::as_str).collect();
        let frequency: u64 = distinct
            .iter()
            .map(|e| counts.get(e).copied().unwrap_or(0))
            .sum();
        if record.frequency != frequency {
            tracing::debug!(
                target: "rca_catalog::frequency",
                pattern = %record.name,
                from = record.frequency,
                to = frequency,
                "frequency updated"
            );
        }
        record.frequency = frequency;
        total += frequency;
    }
    total
}
