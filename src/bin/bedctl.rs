//! Command-line control for SUTA BLE beds.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::builder::PossibleValuesParser;
use tracing_subscriber::EnvFilter;

use suta_bed::{BedCommand, BedController, BtleplugConfig, BtleplugTransport, Error};

#[derive(Parser)]
#[command(
    name = "bedctl",
    version,
    about = "Control your Bluetooth-enabled SUTA (and compatible) bed"
)]
struct Args {
    /// Action to perform.
    #[arg(value_parser = command_names())]
    command: String,

    /// Address of your bed. May be omitted, in which case exactly one
    /// bed must be discovered within the timeout.
    #[arg(long = "MAC")]
    mac: Option<String>,

    /// Bluetooth adapter to use, like "hci0".
    #[arg(long)]
    adapter: Option<String>,

    /// Discovery window in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn command_names() -> PossibleValuesParser {
    PossibleValuesParser::new(BedCommand::ALL.map(BedCommand::name))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let command = BedCommand::from_name(&args.command)?;

    let mut config = BtleplugConfig::new();
    if let Some(adapter) = &args.adapter {
        config = config.adapter(adapter);
    }
    let transport = Arc::new(BtleplugTransport::new(config).await?);

    let mut controller = BedController::new(transport);
    controller.start().await?;

    let mut devices = controller.devices().ok_or(Error::ChannelClosed)?;
    let bed = devices
        .select(args.mac.as_deref(), Duration::from_secs(args.timeout))
        .await?;
    tracing::info!("using bed {}", bed.device());

    let outcome = bed.execute(command).await;
    controller.stop().await?;
    outcome
}
