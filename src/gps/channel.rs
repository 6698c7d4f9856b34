// src/gps/channel.rs
//! Byte channels the transport detector reads from
//!
//! [`SerialChannel`] talks to a real receiver. [`ReplayChannel`] plays back a
//! recorded NMEA log so detection and metrics can be exercised on a desk.

use crate::error::{GpsError, Result};
use std::{
    collections::VecDeque,
    io::{Read, Write},
    path::Path,
    time::{Duration, Instant},
};
use tokio_serial::SerialPort;
use tracing::{debug, warn};

/// Minimal serial-port surface needed by the detector.
pub trait ByteChannel {
    /// (Re)open the channel at `baud_rate`
    fn open(&mut self, baud_rate: u32) -> Result<()>;

    fn close(&mut self);

    /// Bytes that can be read right now without blocking
    fn available(&mut self) -> usize;

    fn read(&mut self) -> Option<u8>;

    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

const READ_CHUNK: usize = 256;

/// Serial port backed channel
pub struct SerialChannel {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    pending: VecDeque<u8>,
}

impl SerialChannel {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
            pending: VecDeque::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn fill(&mut self) {
        let Some(port) = self.port.as_mut() else {
            return;
        };

        let ready = match port.bytes_to_read() {
            Ok(n) => (n as usize).min(READ_CHUNK),
            Err(e) => {
                warn!("Error polling serial port {}: {}", self.path, e);
                return;
            }
        };
        if ready == 0 {
            return;
        }

        let mut buf = [0u8; READ_CHUNK];
        match port.read(&mut buf[..ready]) {
            Ok(n) => self.pending.extend(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => warn!("Error reading from serial port {}: {}", self.path, e),
        }
    }
}

impl ByteChannel for SerialChannel {
    fn open(&mut self, baud_rate: u32) -> Result<()> {
        self.close();
        let port = tokio_serial::new(&self.path, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        debug!("Opened {} at {} baud", self.path, baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
        self.pending.clear();
    }

    fn available(&mut self) -> usize {
        if self.pending.is_empty() {
            self.fill();
        }
        self.pending.len()
    }

    fn read(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.fill();
        }
        self.pending.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| GpsError::Connection(format!("Serial port {} is not open", self.path)))?;
        port.write_all(bytes)?;
        Ok(())
    }
}

/// Replays a recorded NMEA log as if a receiver were attached at `native_baud`.
///
/// One line is released every `line_interval`. Opened at any other baud rate the
/// channel yields scrambled bytes, which is what a real UART does on a mismatch.
pub struct ReplayChannel {
    lines: Vec<Vec<u8>>,
    next_line: usize,
    native_baud: u32,
    open_baud: Option<u32>,
    line_interval: Duration,
    last_release: Option<Instant>,
    pending: VecDeque<u8>,
}

impl ReplayChannel {
    pub fn new(log: &str, native_baud: u32, line_interval: Duration) -> Self {
        let lines = log
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| format!("{}\r\n", line).into_bytes())
            .collect();

        Self {
            lines,
            next_line: 0,
            native_baud,
            open_baud: None,
            line_interval,
            last_release: None,
            pending: VecDeque::new(),
        }
    }

    pub fn from_file(path: &Path, native_baud: u32, line_interval: Duration) -> Result<Self> {
        let log = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Other(format!("Failed to read replay log {}: {}", path.display(), e)))?;
        let channel = Self::new(&log, native_baud, line_interval);
        if channel.lines.is_empty() {
            return Err(GpsError::Other(format!("Replay log {} is empty", path.display())));
        }
        Ok(channel)
    }

    fn release_due_lines(&mut self) {
        let Some(baud) = self.open_baud else {
            return;
        };
        if self.lines.is_empty() || !self.pending.is_empty() {
            return;
        }

        let due = self
            .last_release
            .map_or(true, |at| at.elapsed() >= self.line_interval);
        if !due {
            return;
        }
        self.last_release = Some(Instant::now());

        let line = &self.lines[self.next_line];
        self.next_line = (self.next_line + 1) % self.lines.len();
        if baud == self.native_baud {
            self.pending.extend(line.iter().copied());
        } else {
            self.pending.extend(line.iter().map(|b| scramble(*b)));
        }
    }
}

impl ByteChannel for ReplayChannel {
    fn open(&mut self, baud_rate: u32) -> Result<()> {
        self.pending.clear();
        self.open_baud = Some(baud_rate);
        self.last_release = None;
        Ok(())
    }

    fn close(&mut self) {
        self.open_baud = None;
        self.pending.clear();
    }

    fn available(&mut self) -> usize {
        self.release_due_lines();
        self.pending.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.release_due_lines();
        self.pending.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        debug!("Replay channel discarding {} command bytes", bytes.len());
        Ok(())
    }
}

/// What a byte looks like when sampled at the wrong baud rate: never a `$` or line end
pub(crate) fn scramble(byte: u8) -> u8 {
    byte ^ 0x55
}

/// Test receiver that only makes sense at `native_baud`
#[cfg(test)]
pub(crate) mod mock {
    use super::{scramble, ByteChannel};
    use crate::{
        error::{GpsError, Result},
        gps::nmea::with_checksum,
    };
    use std::collections::VecDeque;

    pub struct MockChannel {
        pub native_baud: u32,
        pub open_baud: Option<u32>,
        pub pending: VecDeque<u8>,
        pub opened: Vec<u32>,
        pub written: Vec<String>,
        pub fail_open: bool,
    }

    impl MockChannel {
        pub fn new(native_baud: u32) -> Self {
            Self {
                native_baud,
                open_baud: None,
                pending: VecDeque::new(),
                opened: Vec::new(),
                written: Vec::new(),
                fail_open: false,
            }
        }

        /// Queue a sentence as it would arrive at the currently open baud rate
        pub fn transmit(&mut self, body: &str) {
            let line = with_checksum(body) + "\r\n";
            let matched = self.open_baud == Some(self.native_baud);
            self.pending
                .extend(line.bytes().map(|b| if matched { b } else { scramble(b) }));
        }
    }

    impl ByteChannel for MockChannel {
        fn open(&mut self, baud_rate: u32) -> Result<()> {
            self.opened.push(baud_rate);
            if self.fail_open {
                return Err(GpsError::Connection("port busy".to_string()));
            }
            self.open_baud = Some(baud_rate);
            Ok(())
        }

        fn close(&mut self) {
            self.open_baud = None;
            self.pending.clear();
        }

        fn available(&mut self) -> usize {
            self.pending.len()
        }

        fn read(&mut self) -> Option<u8> {
            self.pending.pop_front()
        }

        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.written.push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n\n$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\n";

    fn read_line(channel: &mut ReplayChannel) -> Vec<u8> {
        let mut out = Vec::new();
        while channel.available() > 0 {
            let Some(b) = channel.read() else { break };
            out.push(b);
            if b == b'\n' {
                break;
            }
        }
        out
    }

    #[test]
    fn test_replay_at_native_baud() {
        let mut channel = ReplayChannel::new(LOG, 9600, Duration::from_secs(3600));
        channel.open(9600).unwrap();

        let bytes = read_line(&mut channel);
        assert!(bytes.starts_with(b"$GPGGA"));
        assert!(bytes.ends_with(b"*47\r\n"));
        // Next line is not due yet
        assert_eq!(channel.available(), 0);
    }

    #[test]
    fn test_replay_wraps_around() {
        let mut channel = ReplayChannel::new(LOG, 9600, Duration::ZERO);
        channel.open(9600).unwrap();

        let mut starts = Vec::new();
        for _ in 0..3 {
            let line = read_line(&mut channel);
            starts.push(line[..6].to_vec());
        }
        assert_eq!(starts, vec![b"$GPGGA".to_vec(), b"$GPRMC".to_vec(), b"$GPGGA".to_vec()]);
    }

    #[test]
    fn test_replay_scrambles_wrong_baud() {
        let mut channel = ReplayChannel::new(LOG, 9600, Duration::ZERO);
        channel.open(115200).unwrap();

        let ready = channel.available();
        let bytes: Vec<u8> = (0..ready).filter_map(|_| channel.read()).collect();
        assert!(!bytes.is_empty());
        assert!(!bytes.contains(&b'$'));
        assert!(!bytes.contains(&b'\n'));
    }

    #[test]
    fn test_closed_channel_is_silent() {
        let mut channel = ReplayChannel::new(LOG, 9600, Duration::ZERO);
        assert_eq!(channel.available(), 0);
        assert_eq!(channel.read(), None);
    }

    #[test]
    fn test_serial_write_requires_open_port() {
        let mut channel = SerialChannel::new("/dev/does-not-exist");
        assert!(matches!(channel.write(b"x"), Err(GpsError::Connection(_))));
        assert!(matches!(channel.open(9600), Err(GpsError::Serial(_))));
        assert_eq!(channel.available(), 0);
    }
}
