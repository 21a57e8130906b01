//! Whole-catalog persistence.
//!
//! The catalog is read once at the start of a run and rewritten in full at
//! the end. There is no locking: two processes saving the same file race and
//! the later rename wins. Callers that may run concurrently must serialise
//! access themselves.

use super::{Catalog, ExamplesField, PatternRecord};
use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Column order of the persisted table.
pub const CATALOG_COLUMNS: [&str; 7] = [
    "pattern",
    "examples",
    "frequency",
    "category",
    "root_cause",
    "fix_type",
    "prevention_step",
];

/// Repository over the persisted catalog.
pub trait CatalogStore {
    /// Load the full catalog. A store that does not exist yet yields an
    /// empty catalog.
    fn load(&self) -> Result<Catalog>;

    /// Replace the stored catalog with `catalog`.
    fn save(&self, catalog: &Catalog) -> Result<()>;
}

// ---------------------------------------------------------------------------
// CsvCatalogStore
// ---------------------------------------------------------------------------

/// Catalog persisted as a CSV table with [`CATALOG_COLUMNS`].
#[derive(Debug, Clone)]
pub struct CsvCatalogStore {
    path: PathBuf,
}

impl CsvCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a catalog table from any reader.
    ///
    /// Columns are located by header name, so order does not matter and
    /// absent columns read as empty. A `frequency` that is not a
    /// non-negative integer reads as 0.
    pub fn read_from<R: std::io::Read>(reader: R) -> Result<Catalog> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: HashMap<String, usize> = rdr
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();

        let mut catalog = Catalog::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |name: &str| column(&columns, &record, name);

            let examples = ExamplesField::from_cell(cell("examples"));
            if examples.is_corrupt() {
                tracing::warn!(
                    target: "rca_catalog::store",
                    row,
                    pattern = cell("pattern"),
                    "examples cell is not a JSON string list; row contributes no examples"
                );
            }

            catalog.push(PatternRecord {
                name: cell("pattern").to_string(),
                examples,
                frequency: parse_frequency(cell("frequency")),
                category: cell("category").to_string(),
                root_cause: cell("root_cause").to_string(),
                fix_type: cell("fix_type").to_string(),
                prevention_step: cell("prevention_step").to_string(),
            });
        }
        Ok(catalog)
    }

    /// Write a catalog table, header first, to any writer.
    pub fn write_to<W: std::io::Write>(catalog: &Catalog, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(CATALOG_COLUMNS)?;
        for r in catalog.records() {
            let frequency = r.frequency.to_string();
            let examples = r.examples.to_cell();
            wtr.write_record([
                r.name.as_str(),
                examples.as_str(),
                frequency.as_str(),
                r.category.as_str(),
                r.root_cause.as_str(),
                r.fix_type.as_str(),
                r.prevention_step.as_str(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        let tmp = format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4());
        match self.path.parent() {
            Some(dir) => dir.join(tmp),
            None => PathBuf::from(tmp),
        }
    }
}

fn column<'r>(columns: &HashMap<String, usize>, record: &'r csv::StringRecord, name: &str) -> &'r str {
    columns
        .get(name)
        .and_then(|&i| record.get(i))
        .unwrap_or("")
}

fn parse_frequency(cell: &str) -> u64 {
    let trimmed = cell.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return n;
    }
    // Spreadsheet exports sometimes write integers as "3.0".
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => f as u64,
        _ => 0,
    }
}

impl CatalogStore for CsvCatalogStore {
    fn load(&self) -> Result<Catalog> {
        if !self.path.exists() {
            tracing::info!(
                target: "rca_catalog::store",
                path = %self.path.display(),
                "no catalog file yet, starting empty"
            );
            return Ok(Catalog::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let catalog = Self::read_from(file)?;
        tracing::info!(
            target: "rca_catalog::store",
            path = %self.path.display(),
            rows = catalog.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Writes to a sibling temp file then renames it over the target, so an
    /// interrupted save leaves the previous catalog intact.
    fn save(&self, catalog: &Catalog) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.temp_path();
        let written: Result<()> = std::fs::File::create(&tmp)
            .map_err(Into::into)
            .and_then(|file| Self::write_to(catalog, file))
            .and_then(|()| std::fs::rename(&tmp, &self.path).map_err(Into::into));
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        written?;
        tracing::info!(
            target: "rca_catalog::store",
            path = %self.path.display(),
            rows = catalog.len(),
            "catalog saved"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCatalogStore
// ---------------------------------------------------------------------------

/// In-memory store. Starts empty unless seeded; counts saves.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    catalog: Mutex<Catalog>,
    saves: Mutex<usize>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            saves: Mutex::new(0),
        }
    }

    /// Copy of the currently stored catalog.
    pub fn snapshot(&self) -> Catalog {
        lock(&self.catalog).clone()
    }

    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }
}

/// Saves replace the whole value, so a poisoned lock still guards a
/// consistent catalog.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CatalogStore for MemoryCatalogStore {
    fn load(&self) -> Result<Catalog> {
        Ok(self.snapshot())
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        *lock(&self.catalog) = catalog.clone();
        *lock(&self.saves) += 1;
        Ok(())
    }
}
