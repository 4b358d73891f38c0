// Writes synthetic Parquet seed files for the record services

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use record_service::seeds::{write_seeds, SeedOptions, DEFAULT_STUDENTS};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "generate-seeds")]
#[command(about = "Generate synthetic attendance, gradebook and ISAT datasets")]
struct Cli {
    /// Output directory (defaults to DATA_DIR or ./data)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Number of students in the cohort
    #[arg(long, default_value_t = DEFAULT_STUDENTS)]
    students: usize,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let out = cli
        .out
        .or_else(|| std::env::var("DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./data"));

    tracing::info!(students = cli.students, out = %out.display(), "Generating seed data");

    let summary = write_seeds(
        &out,
        &SeedOptions {
            students: cli.students,
            seed: cli.seed,
        },
    )
    .with_context(|| format!("Failed to write seed files to {}", out.display()))?;

    tracing::info!(
        students = summary.students,
        files = summary.files.len(),
        "Done"
    );
    Ok(())
}
