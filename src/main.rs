use clap::{CommandFactory, Parser};
use colored::*;
use rca_catalog::catalog::store::{CatalogStore, CsvCatalogStore};
use rca_catalog::cli::{Args, Command};
use rca_catalog::config::AgentConfig;
use rca_catalog::diff_matcher::{builtin_patterns, load_patterns, DiffMatcher};
use rca_catalog::llm::{LlmClient, CATALOG_SYSTEM_PROMPT, DIFF_SYSTEM_PROMPT};
use rca_catalog::overview::{render_diff_report, render_overview, render_summary, CatalogOverview};
use rca_catalog::pipeline::CatalogPipeline;
use rca_catalog::InputBatch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rca_catalog=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(args: Args) -> rca_catalog::Result<()> {
    if let Command::Completions { shell } = &args.command {
        let mut cmd = Args::command();
        clap_complete::generate(*shell, &mut cmd, "rca-catalog", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AgentConfig::load(args.config.as_deref())?;
    args.apply_to(&mut config);

    match &args.command {
        Command::Analyze { report, json, .. } => {
            // Structural problems with the report surface before the catalog
            // or the service is touched.
            let batch = InputBatch::from_report_path(report)?;
            let store = CsvCatalogStore::new(&config.catalog.path);
            let client = LlmClient::new(&config.llm)?.with_system_prompt(CATALOG_SYSTEM_PROMPT);
            let outcome = CatalogPipeline::new(&store, &client, &config.llm.model)
                .with_policy(config.catalog.merge_policy)
                .run(&batch)
                .await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
            } else {
                print!("{}", render_summary(&outcome.summary));
                println!();
                print!("{}", render_overview(&CatalogOverview::from_catalog(&outcome.catalog)));
            }
        }
        Command::Diff { diff_file, patterns, json } => {
            let diff = std::fs::read_to_string(diff_file)?;
            let patterns = match patterns {
                Some(path) => load_patterns(path)?,
                None => builtin_patterns().to_vec(),
            };
            let client = LlmClient::new(&config.llm)?.with_system_prompt(DIFF_SYSTEM_PROMPT);
            let report = DiffMatcher::new(&client, &config.llm.model, &patterns)
                .analyze(&diff)
                .await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_diff_report(&report));
            }
        }
        Command::Catalog { json, .. } => {
            let catalog = CsvCatalogStore::new(&config.catalog.path).load()?;
            let overview = CatalogOverview::from_catalog(&catalog);
            if *json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                print!("{}", render_overview(&overview));
            }
        }
        Command::Completions { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
