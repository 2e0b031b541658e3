//! Warden daemon - credential authority and agent supervision service
//!
//! The daemon provides:
//! - REST API for token mint/validate/revoke with lineage-closed revocation
//! - Sandboxed agent spawning with per-agent monitoring loops
//! - A tamper-evident audit ledger with verification and export

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use config::DaemonConfig;
use error::DaemonResult;
use server::Server;

/// Warden Daemon CLI
#[derive(Parser)]
#[command(name = "wardend")]
#[command(about = "Warden daemon - scoped credentials, supervised sandboxes, audited actions", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "WARDEN_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "WARDEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "WARDEN_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
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

    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| error::DaemonError::Config(e.to_string()))?;

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| error::DaemonError::Config(format!("invalid listen address: {e}")))?;
    }

    let server = Server::development(config).await?;
    server.run().await
}
