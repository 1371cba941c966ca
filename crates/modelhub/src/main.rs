//! Model Hub server binary.

use anyhow::Result;
use clap::Parser;
use config::Config;
use modelhub::{AppState, create_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Model Hub: REST service for neural-network model lifecycle management.
#[derive(Parser)]
#[command(name = "modelhub")]
#[command(about = "REST service for users, datasets, and AI model metadata")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Listen address (overrides MODELHUB_BIND_ADDR)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "model hub listening");

    axum::serve(listener, app).await?;

    Ok(())
}
