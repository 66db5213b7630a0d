//! # VBus Bridge
//!
//! Read sensor data from RESOL VBus solar and heating controllers.
//!
//! This application listens on a serial port for VBus data telegrams,
//! decodes them, and logs the configured sensor fields as a JSON
//! attribute map.

use anyhow::Result;
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber;

mod config;
mod error;
mod sensor;
mod serial;
mod vbus;

use config::Config;
use sensor::VbusSensor;
use serial::{PacketFilter, VbusSerial};

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for VBus Bridge
///
/// Loads the configuration and either decodes a single configured debug
/// telegram (one-shot mode) or polls the serial port on the configured
/// scan interval until Ctrl+C.
///
/// A failed read or decode is logged and the loop continues with the
/// next scan; one corrupt telegram never takes the bridge down.
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The serial port cannot be opened
/// - A configured debug message fails to decode (one-shot mode only)
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("VBus Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    let sensor = VbusSensor::new(config.name.clone(), config.fields.clone());

    // One-shot mode: decode the configured telegram and exit
    if let Some(buffer) = config.debug_message_bytes()? {
        let packet = vbus::decode(&buffer)?;
        let values = sensor.process_packet(&packet);
        info!("{}: {}", sensor.name(), serde_json::to_string(&values)?);
        return Ok(());
    }

    let mut serial = VbusSerial::open(&config.serial.port, config.serial.baud_rate)?;
    info!("VBus serial port opened at: {}", serial.device_path());

    let mut scan_interval = interval(Duration::from_secs(config.serial.scan_interval_s));

    info!(
        "Scanning {} every {}s",
        serial.device_path(),
        config.serial.scan_interval_s
    );
    info!("Press Ctrl+C to exit");

    // Main scan loop
    loop {
        tokio::select! {
            _ = scan_interval.tick() => {
                if let Err(e) = scan_once(&mut serial, &config.filter, &sensor).await {
                    warn!("Update failed: {}", e);
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Read, decode, and report one telegram
async fn scan_once(
    serial: &mut VbusSerial,
    filter: &PacketFilter,
    sensor: &VbusSensor,
) -> error::Result<()> {
    let buffer = serial.read_buffer(filter).await?;
    let packet = vbus::decode(&buffer)?;

    if !filter.matches_command(packet.command()) {
        info!(
            "Skipping telegram with command 0x{:04X} (filtered)",
            packet.command()
        );
        return Ok(());
    }

    let values = sensor.process_packet(&packet);
    info!(
        "{}: {}",
        sensor.name(),
        serde_json::to_string(&values).unwrap_or_else(|_| "{}".to_string())
    );

    Ok(())
}
