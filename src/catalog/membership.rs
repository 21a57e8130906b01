//! Membership index and batch classification.
//!
//! Membership is exact string equality. No case folding, no trimming.

use super::Catalog;
use crate::batch::InputBatch;
use serde::Serialize;
use std::collections::HashSet;

/// Every example string attached to any record of a catalog.
#[derive(Debug, Clone, Default)]
pub struct MembershipIndex {
    known: HashSet<String>,
}

impl MembershipIndex {
    /// Build from a catalog. Missing and corrupt `examples` cells contribute
    /// nothing.
    pub fn build(catalog: &Catalog) -> Self {
        let known = catalog
            .records()
            .iter()
            .flat_map(|r| r.examples.as_slice().iter().cloned())
            .collect();
        Self { known }
    }

    pub fn contains(&self, reason: &str) -> bool {
        self.known.contains(reason)
    }

    /// Number of distinct known strings.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Split a batch into already-known and new reasons.
    ///
    /// Both halves keep batch order and batch repeats.
    pub fn classify(&self, batch: &InputBatch) -> Classification {
        let (known, new): (Vec<String>, Vec<String>) = batch
            .reasons()
            .iter()
            .cloned()
            .partition(|r| self.contains(r));
        Classification { known, new }
    }
}

/// Result of [`MembershipIndex::classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub known: Vec<String>,
    pub new: Vec<String>,
}

impl Classification {
    pub fn has_new(&self) -> bool {
        !self.new.is_empty()
    }
}
