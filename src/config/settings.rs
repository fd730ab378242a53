use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_MAX_STRAY_REPORTS: usize = 8;
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

/// Runtime settings, read from an optional JSON file and overridden from the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PadSettings {
    /// Serial port of the pad; the first USB serial port when unset.
    pub port_name: Option<String>,
    /// Threshold profile; loading and saving are skipped when unset.
    pub profile_path: Option<PathBuf>,
    pub baud_rate: u32,
    /// Upper bound on a single read from the pad.
    pub read_timeout_ms: u64,
    /// Unrelated lines tolerated while waiting for a query's answer.
    pub max_stray_reports: usize,
    /// Pause between reopen attempts while the pad is disconnected.
    pub reconnect_interval_ms: u64,
    pub log_level: LogLevel,
    /// Print snapshots as JSON lines instead of log messages.
    pub report_json: bool,
}

impl Default for PadSettings {
    fn default() -> Self {
        Self {
            port_name: None,
            profile_path: None,
            baud_rate: crate::serial::interface::BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_stray_reports: DEFAULT_MAX_STRAY_REPORTS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            log_level: LogLevel::default(),
            report_json: false,
        }
    }
}

impl PadSettings {
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}
