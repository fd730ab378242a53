//! In-memory [`SerialLink`] that replays a script of device output.
//!
//! Exposed unconditionally so integration tests and the session/controller
//! unit tests can drive the protocol without hardware.
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::{Result, SerialError, SerialLink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Bytes returned by the next read (split across reads if larger than the buffer).
    Data(Vec<u8>),
    /// The next read sees nothing before its timeout.
    Silence,
    /// The next read fails and the link goes down until reopened.
    Fault,
}

#[derive(Debug)]
pub struct ScriptedLink {
    reads: VecDeque<ReadStep>,
    reopen_results: VecDeque<bool>,
    writes: Vec<Vec<u8>>,
    write_faults: usize,
    connected: bool,
    reopen_attempts: usize,
    drains: usize,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            reopen_results: VecDeque::new(),
            writes: Vec::new(),
            write_faults: 0,
            connected: true,
            reopen_attempts: 0,
            drains: 0,
        }
    }

    /// Link whose device answers with `lines`, one read per line.
    pub fn with_lines(lines: &[&str]) -> Self {
        let mut link = Self::new();
        for line in lines {
            link.push_line(line);
        }
        link
    }

    /// Queue one device line; the terminator is appended.
    pub fn push_line(&mut self, line: &str) -> &mut Self {
        self.push_bytes(format!("{}\n", line).as_bytes())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.reads.push_back(ReadStep::Data(bytes.to_vec()));
        self
    }

    pub fn push_silence(&mut self) -> &mut Self {
        self.reads.push_back(ReadStep::Silence);
        self
    }

    pub fn push_fault(&mut self) -> &mut Self {
        self.reads.push_back(ReadStep::Fault);
        self
    }

    /// Make the next write fail and take the link down.
    pub fn push_write_fault(&mut self) -> &mut Self {
        self.write_faults += 1;
        self
    }

    /// Script the outcome of the next reopen attempt. Unscripted attempts fail.
    pub fn push_reopen(&mut self, succeeds: bool) -> &mut Self {
        self.reopen_results.push_back(succeeds);
        self
    }

    pub fn written(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Written commands as text, without their terminators.
    pub fn written_lines(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end_matches('\n').to_string())
            .collect()
    }

    pub fn clear_written(&mut self) {
        self.writes.clear();
    }

    pub fn reopen_attempts(&self) -> usize {
        self.reopen_attempts
    }

    pub fn drains(&self) -> usize {
        self.drains
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    fn link_down() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected")
    }
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for ScriptedLink {
    fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        if !self.connected {
            return Err(Self::link_down());
        }

        match self.reads.pop_front() {
            None | Some(ReadStep::Silence) => Ok(0),
            Some(ReadStep::Fault) => {
                self.connected = false;
                Err(Self::link_down())
            }
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.reads.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.connected {
            return Err(Self::link_down());
        }
        if self.write_faults > 0 {
            self.write_faults -= 1;
            self.connected = false;
            return Err(Self::link_down());
        }
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn drain(&mut self) -> io::Result<()> {
        if !self.connected {
            return Err(Self::link_down());
        }
        self.drains += 1;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.reopen_attempts += 1;
        match self.reopen_results.pop_front() {
            Some(true) => {
                self.connected = true;
                Ok(())
            }
            _ => Err(SerialError::ConnectionFailed("scripted reopen failure".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_chunk_is_split_across_reads() {
        let mut link = ScriptedLink::new();
        link.push_bytes(b"v 1 2 3\n");

        let mut buf = [0u8; 4];
        assert_eq!(link.read_chunk(&mut buf, Duration::ZERO).unwrap(), 4);
        assert_eq!(&buf, b"v 1 ");
        assert_eq!(link.read_chunk(&mut buf, Duration::ZERO).unwrap(), 4);
        assert_eq!(&buf, b"2 3\n");
        assert_eq!(link.read_chunk(&mut buf, Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_fault_takes_link_down_until_reopen() {
        let mut link = ScriptedLink::new();
        link.push_fault().push_reopen(false).push_reopen(true);

        let mut buf = [0u8; 8];
        assert!(link.read_chunk(&mut buf, Duration::ZERO).is_err());
        assert!(link.write_bytes(b"v\n").is_err());
        assert!(link.reopen().is_err());
        assert!(link.reopen().is_ok());
        assert!(link.write_bytes(b"v\n").is_ok());
        assert_eq!(link.reopen_attempts(), 2);
        assert_eq!(link.written_lines(), vec!["v"]);
    }
}
