//! DTN IoTSC - BLE peripheral daemon entry point

use anyhow::Context;
use clap::Parser;
use tracing::info;

use iotsc_ble::SystemStack;
use iotsc_daemon::{cli::Cli, logging, query_status, Commands, Daemon, DaemonConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = DaemonConfig::load(&cli).context("Invalid configuration")?;

    match cli.command {
        Commands::Start(_) => {
            let _guard = logging::init_logging(&config.log).context("Failed to set up logging")?;
            info!("Starting DTN IoTSC daemon");

            let stack = SystemStack::connect(config.peripheral.adapter.as_deref())
                .await
                .context("Bluetooth platform unavailable")?;
            Daemon::new(config, stack)?.run().await?;
            info!("DTN IoTSC daemon exited");
        }
        Commands::Status => {
            let connected = query_status(config.status.bind, &config.status.path)
                .await
                .context("Failed to query daemon status")?;
            println!("{}", if connected { "connected" } else { "disconnected" });
            if !connected {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
