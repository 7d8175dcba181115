//! # Probe Relay Node
//!
//! Entry point of the relay process.
//!
//! ```text
//! relay-node run [--config relay.toml] [--port 8080]
//! relay-node mksensor --name edge-1 --location fra-1
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_node::{load_config, CliOverrides, ProvisionedSensor, RelayContainer};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

/// Telemetry and command relay for remote probe sensors
#[derive(Parser, Debug)]
#[command(name = "relay-node")]
#[command(about = "Telemetry and command relay for remote probe sensors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve sensors
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen port (overrides file and RELAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Mint credentials for a new sensor
    Mksensor {
        /// Human readable sensor name
        #[arg(long)]
        name: String,

        /// Free-form location label
        #[arg(long)]
        location: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, port } => run(config, port).await,
        Command::Mksensor { name, location } => mksensor(&name, &location),
    }
}

async fn run(config_path: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let _telemetry = init_telemetry(&TelemetryConfig::from_env())
        .context("failed to initialize telemetry")?;

    let config = load_config(config_path.as_deref(), CliOverrides { port })
        .context("failed to load configuration")?;
    info!(
        addr = %config.listen_addr(),
        channel = %config.bus.task_channel,
        shutdown_timeout_ms = config.shutdown_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let container = RelayContainer::new(config);
    container
        .run(shutdown_signal())
        .await
        .context("relay stopped with an error")?;

    info!("Relay stopped");
    Ok(())
}

fn mksensor(name: &str, location: &str) -> Result<()> {
    let minted = ProvisionedSensor::mint(name, location).context("failed to mint sensor")?;
    let entry = minted
        .config_entry()
        .context("failed to render config entry")?;

    println!("sensor id: {}", minted.sensor.id);
    println!("secret:    {}", minted.sensor.secret);
    println!("token:     {}", minted.token);
    println!();
    println!("# append to the relay configuration");
    print!("{entry}");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
