use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use churn_elt::config::Config;
use churn_elt::logging;
use churn_elt::observability::{metrics, push};
use churn_elt::pipeline::{
    DbtCommandEngine, LoadOutcome, PipelineOrchestrator, ReconciliationReporter, RunOutcome,
    RunState, StagingLoader, Warehouse,
};

#[derive(Parser)]
#[command(name = "churn_elt")]
#[command(about = "Telecom churn ELT: stage the customer file, run dbt, reconcile")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./churn_elt.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: load, transform, reconcile
    Run,
    /// Load the input file into staging and archive it, nothing else
    Load,
    /// Print reconciliation statistics for the current staging and mart tables
    Report,
    /// Print the effective configuration
    ShowConfig,
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_pipeline(config: &Config) -> anyhow::Result<()> {
    let warehouse = Warehouse::open(&config.database)?;
    let loader = StagingLoader::from_config(config);
    let engine = Box::new(DbtCommandEngine::new(&config.transform));
    let mut orchestrator = PipelineOrchestrator::new(warehouse, loader, engine);

    let result = orchestrator.run().await;
    let pushgateway = config.observability.pushgateway_url.as_deref();

    match result {
        Ok(RunOutcome::Done { load, stats }) => {
            info!("Run complete: batch {} with {} rows", load.batch_id, load.rows);
            if let Some(url) = pushgateway {
                push::push_run_result(url, &config.observability.job_name, RunState::Done, Some(&stats)).await;
            }
            print_json(&stats)
        }
        Ok(RunOutcome::Skipped { path }) => {
            info!("Run skipped: no input file at {}", path.display());
            if let Some(url) = pushgateway {
                push::push_run_result(url, &config.observability.job_name, RunState::Skipped, None).await;
            }
            Ok(())
        }
        Err(failure) => {
            if let Some(url) = pushgateway {
                push::push_run_result(url, &config.observability.job_name, RunState::Failed, None).await;
            }
            Err(failure.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = logging::init_logging(&config.paths.log_dir);
    metrics::init_metrics(config.observability.metrics_addr.as_deref());

    match cli.command {
        Commands::Run => run_pipeline(&config).await?,
        Commands::Load => {
            let mut warehouse = Warehouse::open(&config.database)?;
            match StagingLoader::from_config(&config).load(&mut warehouse)? {
                LoadOutcome::Loaded(report) => print_json(&report)?,
                LoadOutcome::Skipped { path } => {
                    info!("Nothing to load at {}", path.display());
                }
            }
        }
        Commands::Report => {
            let warehouse = Warehouse::open(&config.database)?;
            let stats = ReconciliationReporter::report(&warehouse)?;
            print_json(&stats)?;
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
