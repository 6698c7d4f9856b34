// src/gps/mod.rs
//! Receiver I/O, NMEA decoding and baud detection

pub mod channel;
pub mod data;
pub mod nmea;
pub mod transport;

pub use channel::{ByteChannel, ReplayChannel, SerialChannel};
pub use data::{FixSample, GpsLocation};
pub use nmea::{NmeaDecoder, SentenceDecoder};
pub use transport::{LinkOutcome, TransportDetector, TransportState};
