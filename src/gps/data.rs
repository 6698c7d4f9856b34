// src/gps/data.rs
//! GPS data structures and utilities

use serde::Serialize;

pub const MPH_PER_KNOT: f64 = 1.150_779;
pub const KMH_PER_KNOT: f64 = 1.852;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GpsLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64, // meters
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GpsTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpsDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Point-in-time view of everything the decoder knows.
///
/// Values the decoder has never seen (or that came from a rejected field)
/// are `None` or flagged invalid; the engine decides how to treat them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixSample {
    pub location: GpsLocation,
    /// Milliseconds since the position was last updated
    pub location_age_ms: Option<u64>,
    pub speed_knots: Option<f64>,
    pub course: Option<f64>, // degrees
    pub satellites: Option<u32>,
    pub hdop: Option<f64>,
    pub time: GpsTime,
    pub date: Option<GpsDate>,
}

impl FixSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fix is a valid position that is younger than `stale_ms`
    pub fn has_fix(&self, stale_ms: u64) -> bool {
        self.location.valid && self.location_age_ms.map_or(false, |age| age < stale_ms)
    }

    /// Speed over ground in mph, 0 when unknown
    pub fn speed_mph(&self) -> f64 {
        self.speed_knots.map_or(0.0, |knots| knots * MPH_PER_KNOT)
    }

    /// Speed over ground in km/h, 0 when unknown
    pub fn speed_kmh(&self) -> f64 {
        self.speed_knots.map_or(0.0, |knots| knots * KMH_PER_KNOT)
    }

    /// HDOP, or `sentinel` when the decoder has none
    pub fn hdop_or(&self, sentinel: f64) -> f64 {
        self.hdop.unwrap_or(sentinel)
    }

    /// Satellites in use; reported even before a fix so acquisition progress is visible
    pub fn satellite_count(&self) -> u32 {
        self.satellites.unwrap_or(0)
    }
}
