//! Command-line front end for the HP 34401A.
//!
//! Selects a measurement function, then polls readings to stdout until Ctrl-C
//! or the requested duration elapses.

use anyhow::{Context, Result};
use clap::Parser;
use hp34401a::adapters::{MockAdapter, Transport, VisaAdapter};
use hp34401a::config::{Settings, DEFAULT_CONFIG_PATH};
use hp34401a::display::{DisplaySink, JsonDisplay, StdoutDisplay};
use hp34401a::{InstrumentAddress, MeasurementFunction, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "hp34401a", version, about = "Poll an HP 34401A multimeter over GPIB")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// GPIB address, overrides the configuration
    #[arg(short, long)]
    address: Option<u8>,

    /// Measurement function to select first (e.g. VOLT:DC, FRES, FREQ)
    #[arg(short, long, value_parser = parse_function)]
    function: Option<MeasurementFunction>,

    /// Poll period in milliseconds, overrides the configuration
    #[arg(short, long)]
    period_ms: Option<u64>,

    /// Use the in-memory meter instead of VISA
    #[arg(long)]
    mock: bool,

    /// Print readings as JSON lines
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn parse_function(s: &str) -> Result<MeasurementFunction, String> {
    s.parse().map_err(|e: hp34401a::DmmError| e.to_string())
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hp34401a={}", settings.application.log_level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if settings.application.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(address) = cli.address {
        settings.instrument.address = address;
    }
    if let Some(period_ms) = cli.period_ms {
        settings.poller.period_ms = period_ms;
    }
    if cli.mock {
        settings.instrument.mock = true;
    }
    settings.validate()?;

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    init_logging(&settings);
    info!("Starting HP 34401A control session");

    let link: Box<dyn Transport> = if settings.instrument.mock {
        Box::new(MockAdapter::new().with_reading(1.0))
    } else {
        Box::new(VisaAdapter::new())
    };

    let mut session = Session::start(link, &settings);
    if !InstrumentAddress::new(settings.instrument.address).is_set() {
        tracing::warn!("No GPIB address configured; pass --address or set instrument.address");
    }

    if let Some(function) = cli.function {
        session.select_function(function).await;
    }

    let sink: Arc<dyn DisplaySink> = if cli.json {
        Arc::new(JsonDisplay)
    } else {
        Arc::new(StdoutDisplay)
    };

    if settings.poller.autostart || cli.duration_secs.is_some() {
        session.start_polling(sink).await?;
    }

    match cli.duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    info!("Stopping");
    session.shutdown().await;
    Ok(())
}
