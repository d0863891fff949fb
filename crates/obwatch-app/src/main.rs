//! obwatch - order-book stream monitor entry point.

use anyhow::Result;
use clap::Parser;
use obwatch_app::{AppConfig, Application, ConfigSource};
use tracing::{info, warn};

/// Order-book stream monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via OBWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install the TLS crypto provider before any WS connection.
    obwatch_ws::init_crypto();

    let args = Args::parse();

    // CLI arg > OBWATCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("OBWATCH_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let (config, source) = AppConfig::load(&config_path)?;

    obwatch_telemetry::init_logging(&config.telemetry.log_filter)?;

    info!("Starting obwatch v{}", env!("CARGO_PKG_VERSION"));
    if source == ConfigSource::Defaults {
        warn!(path = %config_path, "Config file not found, using defaults");
    }
    info!(
        config_path = %config_path,
        file_found = source == ConfigSource::File,
        channel = %config.ws.subscription.channel(),
        dashboard = config.dashboard.enabled,
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    app.run().await?;

    Ok(())
}
