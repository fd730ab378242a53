use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};

use super::{Result, SerialDeviceInfo, SerialError, SerialLink};

pub const BAUD_RATE: u32 = 115200;

// Timeout used while opening; reads override it per call.
const OPEN_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port connection to the pad, backed by the `serialport` crate.
pub struct SerialInterface {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialInterface {
    /// List USB serial ports. Non-USB ports are skipped.
    pub fn discover_devices() -> Result<Vec<SerialDeviceInfo>> {
        let ports = serialport::available_ports()?;
        let mut devices = Vec::new();

        for port in ports {
            if let SerialPortType::UsbPort(usb_info) = port.port_type {
                log::info!(
                    "Port {}: {} [VID {:04X} PID {:04X}]",
                    port.port_name,
                    usb_info.product.as_deref().unwrap_or("USB serial"),
                    usb_info.vid,
                    usb_info.pid
                );
                devices.push(SerialDeviceInfo {
                    port_name: port.port_name.clone(),
                    vid: usb_info.vid,
                    pid: usb_info.pid,
                    serial_number: usb_info.serial_number.clone(),
                    manufacturer: usb_info.manufacturer.clone(),
                    product: usb_info.product.clone(),
                });
            }
        }

        Ok(devices)
    }

    /// Open the named port, or the first USB serial port when no name is given.
    pub fn open(port_name: Option<&str>, baud_rate: u32) -> Result<Self> {
        let port_name = match port_name {
            Some(name) => name.to_string(),
            None => Self::discover_devices()?
                .into_iter()
                .next()
                .map(|device| device.port_name)
                .ok_or(SerialError::NoDevices)?,
        };

        log::info!("Attempting to open {}...", port_name);
        let port = Self::open_port(&port_name, baud_rate)?;
        log::info!("Opened pad on {}", port_name);

        Ok(Self {
            port_name,
            baud_rate,
            port: Some(port),
        })
    }

    fn open_port(port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
        serialport::new(port_name, baud_rate)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => SerialError::PortNotFound(port_name.to_string()),
                _ => SerialError::ConnectionFailed(format!("{}: {}", port_name, e)),
            })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn disconnect(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed {}", self.port_name);
        }
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port is closed"))
    }
}

impl SerialLink for SerialInterface {
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let port = self.port_mut()?;
        port.set_timeout(timeout).map_err(io::Error::from)?;

        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e)
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.port_mut()?.write_all(data)
    }

    fn drain(&mut self) -> io::Result<()> {
        // serialport's flush waits for the output queue to drain (tcdrain on posix).
        self.port_mut()?.flush()
    }

    fn reopen(&mut self) -> Result<()> {
        self.port = None;
        let port = Self::open_port(&self.port_name, self.baud_rate)?;
        self.port = Some(port);
        log::info!("Reopened {}", self.port_name);
        Ok(())
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.disconnect();
    }
}
