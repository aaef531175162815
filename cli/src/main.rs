use anyhow::Context;
use clap::Parser;
use halflife_cli::{logging, Node, NodeConfig, StaticHumanityRegistry, StandaloneNeighborFactory};
use halflife_core::SystemClock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "halflifed")]
#[command(about = "Halflife ledger node", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Host port announced to the peers
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(port) = cli.port {
        config.host.port = port;
    }

    logging::init_tracing(&config.log.level)?;

    let settings = config
        .load_protocol_settings()
        .context("failed to load protocol settings")?;
    let humanity = Arc::new(StaticHumanityRegistry::new(
        config.validator.registered_addresses.as_deref(),
    ));
    let node = Node::new(
        config,
        settings,
        humanity,
        Arc::new(StandaloneNeighborFactory),
        Arc::new(SystemClock),
    )?;

    let handles = node.start();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutting down");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
