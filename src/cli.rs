use crate::catalog::merge::MergePolicy;
use crate::config::{resolve_model, AgentConfig};
use crate::providers::Provider;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rca-catalog")]
#[command(version)]
#[command(about = "Reconcile RCA fail reasons into a failure-pattern catalog")]
pub struct Args {
    /// Config file (default: rca-catalog.toml searched upward from the cwd)
    #[arg(long, global = true, env = "RCA_CATALOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Text-generation provider: openai or anthropic
    #[arg(long, value_enum, global = true)]
    pub provider: Option<Provider>,

    /// Model name (e.g. gpt-4o-mini, claude-sonnet-4-20250514)
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile a report's fail reasons with the catalog and save it
    Analyze {
        /// CSV report with TicketNumber, State, LOBT and CRFailReason columns
        report: PathBuf,

        /// Catalog file to read and rewrite
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// How candidates whose name already exists are merged
        #[arg(long, value_enum)]
        merge_policy: Option<MergePolicy>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a unified diff against known failure patterns
    Diff {
        /// File holding the unified diff
        diff_file: PathBuf,

        /// JSON pattern list (default: built-in patterns)
        #[arg(long)]
        patterns: Option<PathBuf>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored catalog without calling any service
    Catalog {
        #[arg(long)]
        catalog: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Args {
    /// Apply command-line overrides on top of file configuration.
    pub fn apply_to(&self, config: &mut AgentConfig) {
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        config.llm.model = resolve_model(config.llm.provider, &config.llm.model);
        match &self.command {
            Command::Analyze { catalog, merge_policy, .. } => {
                if let Some(path) = catalog {
                    config.catalog.path = path.clone();
                }
                if let Some(policy) = merge_policy {
                    config.catalog.merge_policy = *policy;
                }
            }
            Command::Catalog { catalog: Some(path), .. } => {
                config.catalog.path = path.clone();
            }
            _ => {}
        }
    }
}
