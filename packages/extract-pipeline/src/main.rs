//! Extract/load pipeline CLI
//!
//! `run` walks every record service and replaces the raw warehouse tables;
//! `health` checks each configured service.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extract_pipeline::config::check_page_size;
use extract_pipeline::pipeline::EXTRACTS;
use extract_pipeline::{
    build_pipeline, PipelineConfig, RecordClient, RunReport, SqliteDestination, StepContext,
    StepOutcome,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "extract-pipeline")]
#[command(about = "Load record service datasets into the warehouse")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every domain and replace its raw table
    Run {
        /// Only run these steps (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Run steps one after another; a failure skips the rest
        #[arg(long)]
        sequential: bool,

        /// Override PAGE_SIZE
        #[arg(long)]
        page_size: Option<usize>,

        /// Override WAREHOUSE_PATH
        #[arg(long)]
        warehouse: Option<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that every record service is up
    Health,

    /// List pipeline steps and their sources
    Steps,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,extract_pipeline=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            only,
            sequential,
            page_size,
            warehouse,
            json,
        } => {
            if let Some(size) = page_size {
                config.page_size = check_page_size(size).context("Invalid --page-size")?;
            }
            if let Some(path) = warehouse {
                config.warehouse_path = path;
            }
            run(config, only, sequential, json).await
        }
        Commands::Health => health(&config).await,
        Commands::Steps => {
            for extract in EXTRACTS {
                println!(
                    "{:<12} /{:<12} -> {}.{}",
                    extract.name, extract.domain.resource, config.raw_schema, extract.table
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    config: PipelineConfig,
    only: Vec<String>,
    sequential: bool,
    json: bool,
) -> Result<ExitCode> {
    let warehouse = if config.in_memory_warehouse() {
        SqliteDestination::in_memory().await
    } else {
        SqliteDestination::open(&config.warehouse_path).await
    }
    .with_context(|| format!("Failed to open warehouse {}", config.warehouse_path))?;
    let warehouse = Arc::new(warehouse);

    let mut dag = build_pipeline(&config, warehouse.clone(), sequential)
        .context("Failed to build pipeline")?;
    if !only.is_empty() {
        dag = dag.select(&only).context("Invalid --only selection")?;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after in-flight requests");
            on_signal.cancel();
        }
    });

    tracing::info!(
        steps = ?dag.step_names(),
        warehouse = %config.warehouse_path,
        page_size = config.page_size,
        sequential,
        "Starting pipeline run"
    );

    let ctx = StepContext {
        cancel,
        ..Default::default()
    };
    let report = dag.execute(ctx).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(report: &RunReport) {
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Succeeded(meta) => println!(
                "✓ {:<12} {} rows -> {} ({} columns, {} pages, {:.1}s)",
                step.name,
                meta.row_count,
                meta.table,
                meta.columns.len(),
                meta.pages,
                step.elapsed.as_secs_f64()
            ),
            StepOutcome::Failed { error } => println!("✗ {:<12} {}", step.name, error),
            StepOutcome::Skipped(reason) => println!("- {:<12} skipped ({:?})", step.name, reason),
        }
    }
    println!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
}

async fn health(config: &PipelineConfig) -> Result<ExitCode> {
    let systems = [
        ("SIS", config.sis_api_url.as_str()),
        ("LMS", config.lms_api_url.as_str()),
        ("State Reporting", config.state_api_url.as_str()),
    ];

    let mut all_healthy = true;
    for (name, url) in systems {
        let client = RecordClient::new(url, "", config.api_timeout)?;
        let healthy = client.health_check().await;
        all_healthy &= healthy;
        println!(
            "{} {:<16} {}",
            if healthy { "✓" } else { "✗" },
            name,
            url
        );
    }

    Ok(if all_healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
