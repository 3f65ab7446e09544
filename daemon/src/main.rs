//! DPoS daemon: entry point for running a DPoS node.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dpos_node::{init_logging, DposNode, LogFormat, NodeConfig, StorageBackend};
use dpos_types::{BroadcastError, Broadcaster, NetworkId, SystemClock};

#[derive(Parser)]
#[command(name = "dpos-daemon", about = "DPoS ledger node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long, env = "DPOS_CONFIG")]
    config: Option<PathBuf>,

    /// Network: "live", "test", or "dev".
    #[arg(long, env = "DPOS_NETWORK")]
    network: Option<NetworkId>,

    /// Data directory for ledger storage.
    #[arg(long, env = "DPOS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep the ledger in memory only.
    #[arg(long, env = "DPOS_IN_MEMORY")]
    in_memory: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "DPOS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, env = "DPOS_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Run the witness production loop.
    #[arg(long, env = "DPOS_PRODUCE")]
    produce: bool,

    /// Hex-encoded witness seed. Prefer the env var over the flag.
    #[arg(long, env = "DPOS_WITNESS_KEY", hide_env_values = true)]
    witness_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT or SIGTERM.
    Run,
    /// Print the effective configuration as TOML and exit.
    PrintConfig,
}

/// Stands in for the peer-to-peer transport: records produced blocks in the log.
struct LogBroadcaster;

impl Broadcaster for LogBroadcaster {
    fn broadcast(&self, encoded_block: &[u8]) -> Result<(), BroadcastError> {
        tracing::debug!(bytes = encoded_block.len(), "block ready for broadcast");
        Ok(())
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            NodeConfig::from_toml_file(&path)?
        }
        None => NodeConfig::default(),
    };

    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.in_memory {
        config.storage = StorageBackend::Memory;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if cli.produce {
        config.production.enabled = true;
    }
    if let Some(key) = &cli.witness_key {
        config.production.witness_private_key = Some(key.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::PrintConfig => {
            print!("{}", config.redacted().to_toml_string()?);
        }
        Command::Run => {
            init_logging(config.log_format, &config.log_level)?;
            tracing::info!(
                network = config.network.as_str(),
                data_dir = %config.data_dir.display(),
                storage = ?config.storage,
                produce = config.production.enabled,
                "starting DPoS node"
            );

            let mut node = DposNode::new(config, Arc::new(SystemClock), Arc::new(LogBroadcaster))?;
            node.set_synced(true);
            node.start()?;

            let shutdown = node.shutdown_controller();
            let mut stopped = shutdown.subscribe();
            tokio::select! {
                _ = shutdown.wait_for_signal() => {}
                _ = stopped.recv() => tracing::warn!("node requested shutdown"),
            }
            node.stop().await;

            let head = node.head();
            tracing::info!(
                head = %head.latest_block_hash,
                number = head.latest_block_number,
                "DPoS daemon exited cleanly"
            );
        }
    }

    Ok(())
}
