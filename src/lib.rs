//! Self-growing catalog of production failure patterns.
//!
//! Each run takes the fail reasons of one RCA report, works out which are
//! already covered by the catalog, asks a text-generation service to group
//! the rest into new patterns with prevention guidance, merges those in and
//! recomputes per-pattern frequencies against the report. A separate
//! [`diff_matcher`] maps risky lines of a code diff onto known patterns.

pub mod batch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod diff_matcher;
pub mod error;
pub mod llm;
pub mod overview;
pub mod pipeline;
pub mod providers;
pub mod response;
pub mod synth;

pub use batch::InputBatch;
pub use catalog::merge::MergePolicy;
pub use catalog::store::{CatalogStore, CsvCatalogStore, MemoryCatalogStore};
pub use catalog::{Catalog, ExamplesField, PatternRecord};
pub use error::{RcaError, Result};
pub use llm::{LlmClient, ScriptedGenerator, TextGenerator};
pub use pipeline::{CatalogPipeline, RunOutcome, RunSummary};
pub use response::{MalformedResponse, ParseOutcome};
