pub mod manager;
pub mod models;
pub mod monitor;

pub use manager::ReconnectController;
pub use monitor::PadMonitor;
pub use models::*;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to get response from pad")]
    NoResponse,

    #[error("Pad reports {count} sensors, at most {max} are supported")]
    TooManySensors { count: usize, max: usize },

    #[error("Device not connected")]
    NotConnected,

    #[error("Serial error: {0}")]
    SerialError(#[from] crate::serial::SerialError),

    #[error("Session error: {0}")]
    SessionError(#[from] crate::serial::SessionError),

    #[error("Calibration error: {0}")]
    StoreError(#[from] crate::calibration::StoreError),

    #[error("Profile error: {0}")]
    ProfileError(#[from] crate::config::ProfileError),

    #[error("Polling task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
