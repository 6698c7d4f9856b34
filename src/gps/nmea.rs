// src/gps/nmea.rs
//! NMEA sentence decoding
//!
//! The rest of the crate only talks to the [`SentenceDecoder`] trait. [`NmeaDecoder`]
//! is the implementation used with real receivers: it frames `$...*HH` sentences
//! byte by byte, verifies the XOR checksum and commits GGA/RMC fields.

use super::data::{FixSample, GpsDate, GpsLocation, GpsTime};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::trace;

const MAX_SENTENCE_LEN: usize = 120;
const TALKERS: [&str; 5] = ["GP", "GN", "GL", "GA", "GB"];

/// Running counters, mostly useful to confirm bytes are arriving at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub chars_processed: u64,
    pub passed_checksum: u64,
    pub failed_checksum: u64,
}

/// Incremental sentence decoder fed one byte at a time.
pub trait SentenceDecoder {
    /// Feed one byte. Returns true when it completed a checksum-valid sentence.
    fn feed(&mut self, byte: u8, now: u64) -> bool;

    /// Snapshot of the decoded fields, with ages measured against `now`.
    fn sample(&self, now: u64) -> FixSample;

    fn stats(&self) -> DecoderStats;

    /// Drop all decoded state and counters, e.g. after switching baud rate.
    fn reset(&mut self);
}

#[derive(Debug, Default)]
pub struct NmeaDecoder {
    buffer: Vec<u8>,
    in_sentence: bool,
    stats: DecoderStats,
    fields: FixSample,
    location_updated_at: Option<u64>,
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a framed sentence body (between `$` and CR/LF) and commit its fields
    fn complete(&mut self, body: &[u8], now: u64) -> bool {
        let Some(star) = body.iter().rposition(|b| *b == b'*') else {
            self.stats.failed_checksum += 1;
            return false;
        };
        let (payload, tail) = (&body[..star], &body[star + 1..]);

        let expected = std::str::from_utf8(tail)
            .ok()
            .filter(|hex| hex.len() == 2)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        if expected != Some(checksum(payload)) {
            self.stats.failed_checksum += 1;
            return false;
        }
        self.stats.passed_checksum += 1;

        if let Ok(text) = std::str::from_utf8(payload) {
            trace!(sentence = text, "valid NMEA sentence");
            self.commit(text, now);
        }
        true
    }

    fn commit(&mut self, sentence: &str, now: u64) {
        let parts: Vec<&str> = sentence.split(',').collect();
        let Some(kind) = sentence_type(parts[0]) else {
            return;
        };

        match kind {
            "GGA" => self.commit_gga(&parts, now),
            "RMC" => self.commit_rmc(&parts, now),
            _ => {}
        }
    }

    /// GGA (Global Positioning System Fix Data)
    fn commit_gga(&mut self, parts: &[&str], now: u64) {
        if parts.len() < 10 {
            return;
        }

        if let Some(time) = parse_time(parts[1]) {
            self.fields.time = time;
        }

        self.fields.satellites = parts[7].parse::<u32>().ok();
        self.fields.hdop = parts[8].parse::<f64>().ok();

        let has_fix = parts[6].parse::<u8>().map_or(false, |quality| quality > 0);
        if !has_fix {
            return;
        }

        if let (Some(lat), Some(lon)) = (
            parse_coordinate(parts[2], parts[3], "S"),
            parse_coordinate(parts[4], parts[5], "W"),
        ) {
            let altitude = parts[9].parse::<f64>().unwrap_or(self.fields.location.altitude);
            self.commit_location(lat, lon, altitude, now);
        }
    }

    /// RMC (Recommended Minimum Course)
    fn commit_rmc(&mut self, parts: &[&str], now: u64) {
        if parts.len() < 10 {
            return;
        }

        if let Some(time) = parse_time(parts[1]) {
            self.fields.time = time;
        }
        if let Some(date) = parse_date(parts[9]) {
            self.fields.date = Some(date);
        }

        // 'V' means the receiver considers the solution void
        if parts[2] != "A" {
            return;
        }

        if let (Some(lat), Some(lon)) = (
            parse_coordinate(parts[3], parts[4], "S"),
            parse_coordinate(parts[5], parts[6], "W"),
        ) {
            let altitude = self.fields.location.altitude;
            self.commit_location(lat, lon, altitude, now);
        }

        // An empty field means unknown, not "same as last time"
        self.fields.speed_knots = parts[7].parse::<f64>().ok();
        if let Ok(course) = parts[8].parse::<f64>() {
            self.fields.course = Some(course);
        }
    }

    fn commit_location(&mut self, latitude: f64, longitude: f64, altitude: f64, now: u64) {
        self.fields.location = GpsLocation {
            latitude,
            longitude,
            altitude,
            valid: true,
        };
        self.location_updated_at = Some(now);
    }
}

impl SentenceDecoder for NmeaDecoder {
    fn feed(&mut self, byte: u8, now: u64) -> bool {
        self.stats.chars_processed += 1;

        match byte {
            b'$' => {
                self.buffer.clear();
                self.in_sentence = true;
                false
            }
            b'\r' | b'\n' => {
                if !self.in_sentence {
                    return false;
                }
                self.in_sentence = false;
                let body = std::mem::take(&mut self.buffer);
                let valid = self.complete(&body, now);
                self.buffer = body;
                self.buffer.clear();
                valid
            }
            _ if self.in_sentence => {
                if self.buffer.len() >= MAX_SENTENCE_LEN {
                    // Runaway sentence, most likely a baud mismatch
                    self.in_sentence = false;
                    self.buffer.clear();
                    self.stats.failed_checksum += 1;
                } else {
                    self.buffer.push(byte);
                }
                false
            }
            _ => false,
        }
    }

    fn sample(&self, now: u64) -> FixSample {
        let mut sample = self.fields.clone();
        sample.location_age_ms = self.location_updated_at.map(|at| now.saturating_sub(at));
        sample
    }

    fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// XOR of every byte between `$` and `*`
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Frame a sentence body as `$<body>*HH`
pub fn with_checksum(body: &str) -> String {
    format!("${}*{:02X}", body, checksum(body.as_bytes()))
}

fn sentence_type(address: &str) -> Option<&str> {
    if address.len() != 5 || !address.is_ascii() {
        return None;
    }
    let (talker, kind) = address.split_at(2);
    TALKERS.contains(&talker).then_some(kind)
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed decimal degrees
fn parse_coordinate(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }
    let raw = value.parse::<f64>().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    Some(if hemisphere == negative { -decimal } else { decimal })
}

/// `hhmmss[.ss]`
fn parse_time(value: &str) -> Option<GpsTime> {
    if value.len() < 6 || !value.is_ascii() {
        return None;
    }
    let hour = value[0..2].parse::<u8>().ok()?;
    let minute = value[2..4].parse::<u8>().ok()?;
    let second = value[4..6].parse::<u8>().ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    Some(GpsTime {
        hour,
        minute,
        second,
        valid: true,
    })
}

/// `ddmmyy`
fn parse_date(value: &str) -> Option<GpsDate> {
    if value.len() != 6 || !value.is_ascii() {
        return None;
    }
    let day = value[0..2].parse::<u32>().ok()?;
    let month = value[2..4].parse::<u32>().ok()?;
    let year = 2000 + value[4..6].parse::<i32>().ok()?;
    // Rejects 31/02 and friends as well as out-of-range fields
    NaiveDate::from_ymd_opt(year, month, day)?;
    Some(GpsDate { year, month, day })
}
