use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

// Error tracing
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use shared::config::load_config;

#[derive(Parser, Debug)]
#[command(name = "server", about = "Role-based access gate for the clinical dashboard")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Arc::new(
        load_config(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config))?,
    );

    let addr = config.server.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tokio::select! {
        res = server::app::serve(listener, Arc::clone(&config)) => res?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    info!("Server closed!");
    Ok(())
}
