// src/lib.rs
//! GPS HUD Library
//!
//! Telemetry core for a vehicle head-up unit: finds the receiver's baud rate,
//! decodes NMEA, grades fix quality and derives max speed and 0-60 times.

pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod gps;
pub mod local_time;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod status;

// Re-export main types for convenience
pub use config::HudConfig;
pub use engine::{MetricsSnapshot, TelemetryEngine};
pub use error::{GpsError, Result};
pub use monitor::{GpsSource, HudMonitor};
pub use status::Status;
