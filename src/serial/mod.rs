pub mod interface;
pub mod mock;
pub mod protocol;
pub mod session;

pub use interface::SerialInterface;
pub use protocol::{QueryKind, Report, ReportTag};
pub use session::DeviceSession;

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialDeviceInfo {
    pub port_name: String,
    pub vid: u16,
    pub pid: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// Byte-level transport underneath a [`DeviceSession`].
///
/// Implemented over a real serial port by [`SerialInterface`] and by
/// [`mock::ScriptedLink`] for tests.
pub trait SerialLink {
    /// Reads whatever bytes are available, waiting at most `timeout`.
    /// `Ok(0)` means nothing arrived in time; `Err` means the link is down.
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Writes the whole buffer.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Blocks until every written byte has left the transmit queue.
    fn drain(&mut self) -> io::Result<()>;

    /// Closes and reopens the underlying port. Must not retry internally.
    fn reopen(&mut self) -> Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("No USB serial devices found")]
    NoDevices,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Outcome of a failed [`DeviceSession::read_report`].
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Communication timeout")]
    Timeout,

    #[error("Not a valid report: {0} bytes without a line terminator")]
    MalformedReport(usize),

    #[error("Link fault while reading: {0}")]
    LinkFault(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Link fault while writing: {0}")]
    LinkFault(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Link fault: {0}")]
    LinkFault(#[source] io::Error),

    #[error("Sensor index {index} out of range (sensor count {sensor_count})")]
    IndexOutOfRange { index: usize, sensor_count: usize },
}

impl SessionError {
    pub fn is_link_fault(&self) -> bool {
        matches!(self, SessionError::LinkFault(_))
    }
}

impl From<WriteError> for SessionError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::LinkFault(e) => SessionError::LinkFault(e),
        }
    }
}
