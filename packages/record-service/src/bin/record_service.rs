// Entry point for a record service

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use record_service::{build_app, Config, ParquetLoader, System};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "record-service")]
#[command(about = "Serve education datasets as filtered, paginated REST reads")]
struct Cli {
    /// Which system to serve
    #[arg(value_enum, default_value = "ieta")]
    system: System,

    /// Override PORT
    #[arg(long)]
    port: Option<u16>,

    /// Override DATA_DIR
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,record_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env(cli.system).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    tracing::info!(
        system = cli.system.name(),
        data_dir = %config.data_dir.display(),
        "Starting record service"
    );

    let loader = Arc::new(ParquetLoader::new(&config.data_dir));
    let app = build_app(cli.system, loader, config.request_timeout);

    let addr = config.bind_addr();
    tracing::info!("Listening on {}", addr);
    for endpoint in cli.system.endpoints() {
        tracing::info!("  GET {}", endpoint);
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
