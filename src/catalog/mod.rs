//! # Module: catalog
//!
//! The persisted pattern catalog and the reconciliation engine around it.
//!
//! ## Sub-modules
//! - [`store`]: load/save of the whole catalog (CSV file or in-memory)
//! - [`membership`]: which fail reasons are already known
//! - [`merge`]: folding candidate patterns into the catalog
//! - [`frequency`]: per-run frequency accounting
//!
//! ## Guarantees
//! - A corrupt `examples` cell never aborts a run; the row contributes no
//!   examples and its frequency is recomputed as 0.
//! - Corrupt cells are written back verbatim, so no stored text is lost.

pub mod frequency;
pub mod membership;
pub mod merge;
pub mod store;

use serde::Serialize;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// ExamplesField
// ---------------------------------------------------------------------------

/// Storage form of a record's example list.
///
/// The persisted cell is a JSON array of strings. Anything else is kept as
/// [`ExamplesField::Corrupt`] with the original text so that saving the
/// catalog does not destroy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamplesField {
    List(Vec<String>),
    /// Empty or absent cell.
    Missing,
    Corrupt(String),
}

impl ExamplesField {
    /// Build from an in-memory list, dropping repeated strings but keeping
    /// first-seen order.
    pub fn from_examples<I, S>(examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let list = examples
            .into_iter()
            .map(Into::into)
            .filter(|e| seen.insert(e.clone()))
            .collect();
        ExamplesField::List(list)
    }

    /// Parse a stored cell.
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().is_empty() {
            return ExamplesField::Missing;
        }
        match serde_json::from_str::<Vec<String>>(cell) {
            Ok(list) => ExamplesField::List(list),
            Err(_) => ExamplesField::Corrupt(cell.to_string()),
        }
    }

    /// Render the stored cell.
    pub fn to_cell(&self) -> String {
        match self {
            // Serializing a Vec<String> cannot fail.
            ExamplesField::List(list) => serde_json::to_string(list).unwrap_or_default(),
            ExamplesField::Missing => String::new(),
            ExamplesField::Corrupt(raw) => raw.clone(),
        }
    }

    /// Usable examples; empty for missing or corrupt cells.
    pub fn as_slice(&self) -> &[String] {
        match self {
            ExamplesField::List(list) => list,
            ExamplesField::Missing | ExamplesField::Corrupt(_) => &[],
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, ExamplesField::Corrupt(_))
    }
}

impl Serialize for ExamplesField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Failure category. The stored value is free text; this is a reading of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Infra,
    Code,
    Config,
    Security,
    Process,
    ExternalDependency,
    Other(String),
}

impl Category {
    pub const KNOWN_LABELS: [&'static str; 7] = [
        "Infra",
        "Code",
        "Config",
        "Security",
        "Process",
        "External Dependency",
        "Other",
    ];

    /// Case-insensitive match on the known labels; anything else is kept
    /// verbatim (trimmed) under `Other`.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "infra" => Category::Infra,
            "code" => Category::Code,
            "config" => Category::Config,
            "security" => Category::Security,
            "process" => Category::Process,
            "external dependency" => Category::ExternalDependency,
            "other" | "" => Category::Other("Other".to_string()),
            _ => Category::Other(trimmed.to_string()),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Infra => write!(f, "Infra"),
            Category::Code => write!(f, "Code"),
            Category::Config => write!(f, "Config"),
            Category::Security => write!(f, "Security"),
            Category::Process => write!(f, "Process"),
            Category::ExternalDependency => write!(f, "External Dependency"),
            Category::Other(label) => write!(f, "{}", label),
        }
    }
}

// ---------------------------------------------------------------------------
// PatternRecord
// ---------------------------------------------------------------------------

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternRecord {
    #[serde(rename = "pattern")]
    pub name: String,
    pub examples: ExamplesField,
    /// Matches in the most recent input batch; overwritten every run.
    pub frequency: u64,
    pub category: String,
    pub root_cause: String,
    pub fix_type: String,
    pub prevention_step: String,
}

impl PatternRecord {
    pub fn new(name: impl Into<String>, examples: Vec<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            examples: ExamplesField::from_examples(examples),
            frequency: 0,
            category: category.into(),
            root_cause: String::new(),
            fix_type: String::new(),
            prevention_step: String::new(),
        }
    }

    pub fn category_kind(&self) -> Category {
        Category::from_label(&self.category)
    }

    pub fn has_prevention(&self) -> bool {
        !(self.root_cause.is_empty() && self.fix_type.is_empty() && self.prevention_step.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ordered collection of pattern records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    records: Vec<PatternRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<PatternRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PatternRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [PatternRecord] {
        &mut self.records
    }

    pub fn push(&mut self, record: PatternRecord) {
        self.records.push(record);
    }

    /// First record with exactly this name.
    pub fn find(&self, name: &str) -> Option<&PatternRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Index of the first row with this name whose examples are not corrupt.
    pub(crate) fn position_readable(&self, name: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.name == name && !r.examples.is_corrupt())
    }

    /// Indices of rows whose `examples` cell could not be parsed.
    pub fn corrupt_rows(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.examples.is_corrupt())
            .map(|(i, _)| i)
            .collect()
    }

    /// Total example strings across all rows, duplicates included.
    pub fn example_count(&self) -> usize {
        self.records.iter().map(|r| r.examples.as_slice().len()).sum()
    }
}

impl IntoIterator for Catalog {
    type Item = PatternRecord;
    type IntoIter = std::vec::IntoIter<PatternRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
