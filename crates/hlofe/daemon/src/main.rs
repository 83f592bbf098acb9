//! HLO-FE Daemon - Service allocation front end
//!
//! The daemon provides:
//! - REST API to allocate, re-allocate, update, deallocate and purge services
//! - Compilation of service descriptors into NGSI-LD entities
//! - Notification of the placement engine after every change

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use config::DaemonConfig;
use error::{DaemonError, DaemonResult};
use server::Server;

/// HLO-FE Daemon CLI
#[derive(Parser)]
#[command(name = "hlofed")]
#[command(about = "HLO-FE Daemon - Service allocation front end", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HLOFE_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides the configuration)
    #[arg(short, long, env = "HLOFE_LISTEN_ADDR")]
    listen: Option<String>,

    /// Use the in-memory entity store
    #[arg(long)]
    dev: bool,

    /// Log level (overrides the configuration)
    #[arg(long, env = "HLOFE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "HLOFE_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if cli.dev {
        DaemonConfig::development()
    } else {
        DaemonConfig::load(cli.config.as_deref()).map_err(|e| DaemonError::Config(e.to_string()))?
    };

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "Starting HLO-FE daemon"
    );

    let server = Server::new(config)?;
    server.run().await
}
