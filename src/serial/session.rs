use std::collections::VecDeque;
use std::time::Duration;

use crate::calibration::{clamp_sensor_value, SENSORS_MAX};
use crate::config::PadSettings;

use super::protocol::{self, QueryKind, Report, ReportTag};
use super::{ReadError, SessionError, SerialLink, WriteError};

/// Longest report line accepted, terminator excluded.
pub const LINE_CAPACITY: usize = 256;

const READ_CHUNK_SIZE: usize = 256;

// Stray reports kept between controller ticks; oldest are dropped first.
const STRAY_QUEUE_LIMIT: usize = 16;

/// Request/response session with the pad over an open link.
///
/// Every read is bounded by the configured timeout, so no call blocks for
/// longer than a few read windows.
pub struct DeviceSession<L: SerialLink> {
    link: L,
    rx: Vec<u8>,
    skipping_line: bool,
    capacity: usize,
    read_timeout: Duration,
    max_stray_reports: usize,
    strays: VecDeque<Report>,
}

impl<L: SerialLink> DeviceSession<L> {
    pub fn new(link: L, settings: &PadSettings) -> Self {
        Self::with_limits(link, settings.read_timeout(), settings.max_stray_reports)
    }

    pub fn with_limits(link: L, read_timeout: Duration, max_stray_reports: usize) -> Self {
        Self {
            link,
            rx: Vec::with_capacity(LINE_CAPACITY),
            skipping_line: false,
            capacity: SENSORS_MAX,
            read_timeout,
            max_stray_reports,
            strays: VecDeque::new(),
        }
    }

    /// Numbers stored per report; also the valid threshold index range.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fix the capacity once the sensor count is known.
    pub fn set_capacity(&mut self, sensor_count: usize) {
        self.capacity = sensor_count.min(SENSORS_MAX);
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Drop buffered input and queued strays, e.g. after the port was reopened.
    pub fn reset(&mut self) {
        self.rx.clear();
        self.skipping_line = false;
        self.strays.clear();
    }

    /// Reopen the link and start from a clean buffer.
    pub fn reopen(&mut self) -> super::Result<()> {
        self.link.reopen()?;
        self.reset();
        Ok(())
    }

    /// Read one line from the pad and parse it.
    ///
    /// Bytes after the terminator are kept for the next call. A line longer
    /// than [`LINE_CAPACITY`] is reported once as malformed and the rest of it
    /// is skipped. A timeout discards any unterminated fragment.
    pub fn read_report(&mut self, timeout: Duration) -> Result<Report, ReadError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(line) = self.take_line()? {
                log::trace!("rx: {}", String::from_utf8_lossy(&line).trim_end());
                return Ok(protocol::parse_report(&line, self.capacity));
            }

            let n = self
                .link
                .read_chunk(&mut chunk, timeout)
                .map_err(ReadError::LinkFault)?;
            if n == 0 {
                // A fragment left over from before the silence belongs to no
                // future line (the pad may have reset mid-line).
                if !self.rx.is_empty() {
                    log::debug!("Dropping {} unterminated bytes after timeout", self.rx.len());
                }
                self.rx.clear();
                self.skipping_line = false;
                return Err(ReadError::Timeout);
            }
            self.rx.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_line(&mut self) -> Result<Option<Vec<u8>>, ReadError> {
        loop {
            let newline = self.rx.iter().position(|&b| b == b'\n');
            match newline {
                Some(pos) if self.skipping_line => {
                    self.rx.drain(..=pos);
                    self.skipping_line = false;
                }
                Some(pos) if pos > LINE_CAPACITY => {
                    self.rx.drain(..=pos);
                    return Err(ReadError::MalformedReport(pos));
                }
                Some(pos) => return Ok(Some(self.rx.drain(..=pos).collect())),
                None if self.skipping_line => {
                    self.rx.clear();
                    return Ok(None);
                }
                None if self.rx.len() > LINE_CAPACITY => {
                    let len = self.rx.len();
                    self.rx.clear();
                    self.skipping_line = true;
                    return Err(ReadError::MalformedReport(len));
                }
                None => return Ok(None),
            }
        }
    }

    /// Write a command and wait until it has been transmitted.
    pub fn write_command(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        log::trace!("tx: {}", String::from_utf8_lossy(bytes).trim_end());
        self.link.write_bytes(bytes).map_err(WriteError::LinkFault)?;
        self.link.drain().map_err(WriteError::LinkFault)
    }

    pub fn query_values(&mut self) -> Result<Report, SessionError> {
        self.query(QueryKind::Values)
    }

    pub fn query_thresholds(&mut self) -> Result<Report, SessionError> {
        self.query(QueryKind::Thresholds)
    }

    /// Send a query and wait for the report carrying the matching tag.
    ///
    /// A silent pad yields an empty report rather than an error. Reports of
    /// the other kind are queued as strays; see [`Self::take_stray_reports`].
    pub fn query(&mut self, kind: QueryKind) -> Result<Report, SessionError> {
        self.write_command(protocol::format_query(kind))?;
        let wanted = kind.tag();

        for _ in 0..=self.max_stray_reports {
            match self.read_report(self.read_timeout) {
                Ok(report) if report.tag == wanted => return Ok(report),
                Ok(report) if report.tag == ReportTag::Unrecognized => {
                    log::debug!("Discarding unrecognized line while waiting for {:?}", wanted);
                }
                Ok(report) => {
                    log::debug!("Queued {:?} report received while waiting for {:?}", report.tag, wanted);
                    self.queue_stray(report);
                }
                Err(ReadError::Timeout) => {
                    log::debug!("No response to {:?} query", kind);
                    return Ok(Report::empty(wanted));
                }
                Err(ReadError::MalformedReport(len)) => {
                    log::warn!("Not a valid report ({} bytes without terminator), discarding", len);
                }
                Err(ReadError::LinkFault(e)) => return Err(SessionError::LinkFault(e)),
            }
        }

        log::warn!(
            "Gave up waiting for {:?} after {} unrelated lines",
            wanted,
            self.max_stray_reports + 1
        );
        Ok(Report::empty(wanted))
    }

    /// Send one threshold to the pad and absorb its echo.
    ///
    /// The echo is not checked against the value sent; a tagged echo is
    /// queued as a stray report. Returns the clamped value that was sent.
    pub fn set_threshold(&mut self, index: usize, value: i64) -> Result<i32, SessionError> {
        if index >= self.capacity {
            return Err(SessionError::IndexOutOfRange {
                index,
                sensor_count: self.capacity,
            });
        }

        let value = clamp_sensor_value(value);
        self.write_command(&protocol::format_set_threshold(index, value))?;

        match self.read_report(self.read_timeout) {
            Ok(report) if report.tag != ReportTag::Unrecognized => self.queue_stray(report),
            Ok(_) => log::debug!("Ignoring unrecognized echo for sensor {}", index),
            Err(ReadError::LinkFault(e)) => return Err(SessionError::LinkFault(e)),
            Err(e) => log::debug!("No echo for sensor {}: {}", index, e),
        }

        Ok(value)
    }

    pub fn take_stray_reports(&mut self) -> Vec<Report> {
        self.strays.drain(..).collect()
    }

    fn queue_stray(&mut self, report: Report) {
        if self.strays.len() == STRAY_QUEUE_LIMIT {
            self.strays.pop_front();
        }
        self.strays.push_back(report);
    }
}
