//! Resilient flight routes service.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                  ROUTES SERVICE                      │
//!                         │                                                      │
//!   GET /api/flights/     │  ┌─────────┐    ┌──────────────────────────────────┐ │
//!   routes?from&to ───────┼─▶│  http   │───▶│       resilience pipeline        │ │
//!                         │  │ server  │    │  timeout → retry → breaker → op  │ │
//!                         │  └────┬────┘    └────────────────┬─────────────────┘ │
//!                         │       │                          │                   │
//!   GET /health ──────────┼───────┤                          ▼                   │
//!                         │       │                   ┌──────────────┐           │
//!                         │       ▼                   │ route store  │           │
//!                         │  ┌─────────┐              │  (+ faults)  │           │
//!                         │  │ health  │─── ping ────▶│              │           │
//!                         │  │ checks  │              └──────────────┘           │
//!                         │  └─────────┘                                         │
//!                         │                                                      │
//!                         │  ┌────────────────────────────────────────────────┐ │
//!                         │  │  config · observability · lifecycle            │ │
//!                         │  └────────────────────────────────────────────────┘ │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use resilient_routes::config::{load_config, ServiceConfig};
use resilient_routes::lifecycle;
use resilient_routes::observability::init_tracing;

#[derive(Parser)]
#[command(name = "resilient-routes")]
#[command(about = "Flight routes API guarded by timeout, retry and circuit breaker", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-routes starting");
    tracing::info!(
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        timeout_ms = config.timeout.duration_ms,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
