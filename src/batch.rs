//! Input batches: the fail reasons of one uploaded RCA report.

use crate::error::{RcaError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Columns every report must carry. Only [`FAIL_REASON_COLUMN`] is consumed.
pub const REQUIRED_COLUMNS: [&str; 4] = ["TicketNumber", "State", "LOBT", "CRFailReason"];
pub const FAIL_REASON_COLUMN: &str = "CRFailReason";

/// Fail-reason strings of one report, in report order.
///
/// Repeats are kept: a reason that appears three times counts three times
/// toward frequencies and appears three times in the new-reason list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InputBatch {
    reasons: Vec<String>,
}

impl InputBatch {
    pub fn new<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Occurrence count per distinct reason.
    pub fn counts(&self) -> HashMap<&str, u64> {
        let mut counts = HashMap::new();
        for r in &self.reasons {
            *counts.entry(r.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Load the batch from a report file. See [`InputBatch::from_report_reader`].
    pub fn from_report_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let batch = Self::from_report_reader(file)?;
        tracing::info!(
            target: "rca_catalog::batch",
            path = %path.display(),
            reasons = batch.len(),
            "report loaded"
        );
        Ok(batch)
    }

    /// Read a CSV report.
    ///
    /// Fails with [`RcaError::MissingColumns`] unless every column in
    /// [`REQUIRED_COLUMNS`] is present in the header. Blank fail-reason cells
    /// are dropped; everything else is kept exactly as written.
    pub fn from_report_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h.trim() == **col))
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RcaError::MissingColumns {
                required: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
                missing,
            });
        }

        let idx = headers
            .iter()
            .position(|h| h.trim() == FAIL_REASON_COLUMN)
            .ok_or_else(|| RcaError::InvalidArgument(format!("no {} column", FAIL_REASON_COLUMN)))?;

        let mut reasons = Vec::new();
        for record in rdr.records() {
            let record = record?;
            match record.get(idx) {
                Some(cell) if !cell.trim().is_empty() => reasons.push(cell.to_string()),
                _ => {}
            }
        }
        Ok(Self { reasons })
    }
}
