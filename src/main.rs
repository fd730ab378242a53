//! Headless calibration host for the danspad pad.
//!
//! Usage: danspad-tuner [PORT] [PROFILE] [OPTIONS]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use danspad_lib::config::{LogLevel, PadSettings};
use danspad_lib::SerialInterface;

#[derive(Parser, Debug)]
#[command(name = "danspad-tuner")]
#[command(about = "Poll a danspad sensor pad and keep its thresholds in a profile file")]
struct Args {
    /// Serial port of the pad (first USB serial port if omitted)
    port: Option<String>,

    /// Threshold profile, applied on connect and saved on exit
    profile: Option<PathBuf>,

    /// JSON settings file; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Read timeout per report in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Print snapshots as JSON lines on stdout
    #[arg(short, long)]
    json: bool,

    /// List USB serial ports and exit
    #[arg(long)]
    list: bool,
}

impl Args {
    fn into_settings(self) -> anyhow::Result<PadSettings> {
        let mut settings = match &self.config {
            Some(path) => PadSettings::from_json_file(path)
                .with_context(|| format!("Failed to read settings from '{}'", path.display()))?,
            None => PadSettings::default(),
        };

        if self.port.is_some() {
            settings.port_name = self.port;
        }
        if self.profile.is_some() {
            settings.profile_path = self.profile;
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.read_timeout_ms = timeout_ms;
        }
        if let Some(level) = self.log_level {
            settings.log_level = level;
        }
        settings.report_json |= self.json;

        Ok(settings)
    }
}

fn list_ports() -> anyhow::Result<()> {
    let devices = SerialInterface::discover_devices().context("Failed to enumerate serial ports")?;
    if devices.is_empty() {
        println!("No USB serial ports found.");
    }
    for device in devices {
        println!(
            "{}  {:04x}:{:04x}  {}",
            device.port_name,
            device.vid,
            device.pid,
            device.product.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let list = args.list;
    let settings = args.into_settings()?;

    env_logger::Builder::new()
        .filter_level(settings.log_level.as_level_filter())
        .parse_default_env()
        .init();

    if list {
        return list_ports();
    }

    log::info!("danspad-tuner {} started", env!("CARGO_PKG_VERSION"));
    danspad_lib::run(settings).await
}
