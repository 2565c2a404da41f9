//! `cadence` node binary.
//!
//! ```text
//! cadence init --home ~/.cadence [--chain-id devnet]
//! cadence run  --home ~/.cadence
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::RngCore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cadence_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::container::config::{config_path, genesis_path};
use node_runtime::{App, GenesisConfig, NodeConfig};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Cadence application node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a node home with default configuration and a genesis file.
    Init {
        #[arg(long, default_value = ".cadence")]
        home: PathBuf,
        #[arg(long, default_value = "cadence-devnet")]
        chain_id: String,
        /// Overwrite existing configuration.
        #[arg(long)]
        force: bool,
    },
    /// Run the node until Ctrl+C.
    Run {
        #[arg(long, default_value = ".cadence")]
        home: PathBuf,
    },
}

fn init(home: PathBuf, chain_id: String, force: bool) -> Result<()> {
    if config_path(&home).exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite",
            config_path(&home).display()
        );
    }

    let config = NodeConfig {
        home: home.clone(),
        chain_id: chain_id.clone(),
        ..Default::default()
    };
    config.validate().context("default configuration is invalid")?;
    std::fs::create_dir_all(config.data_dir())
        .with_context(|| format!("failed to create {}", config.data_dir().display()))?;
    let written = config.write(&home).context("failed to write configuration")?;

    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    let genesis = GenesisConfig::single_validator(chain_id, hex::encode(key));
    genesis.write(&home).context("failed to write genesis")?;

    info!(
        config = %written.display(),
        genesis = %genesis_path(&home).display(),
        "node home initialized"
    );
    Ok(())
}

async fn run(home: PathBuf) -> Result<()> {
    let config = NodeConfig::load(&home)
        .with_context(|| format!("failed to load configuration from {}", home.display()))?;
    let genesis = GenesisConfig::load(&home).context("failed to load genesis")?;
    let app = App::new(config, genesis).context("failed to assemble node")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl+C, shutting down"),
        }
        signal.cancel();
    });

    info!("node is running, press Ctrl+C to stop");
    app.run(shutdown).await.context("node stopped with an error")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&TelemetryConfig::from_env()).context("failed to initialize telemetry")?;

    match cli.command {
        Command::Init {
            home,
            chain_id,
            force,
        } => init(home, chain_id, force),
        Command::Run { home } => run(home).await,
    }
}
