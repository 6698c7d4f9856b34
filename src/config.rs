// src/config.rs
//! Configuration management
//!
//! Settings are stored as pretty-printed JSON under `~/.config/gps-hud/config.json`.
//! Every field has a default, so a partial file (or no file at all) is fine.

use crate::error::{GpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Baud rates tried during detection, fastest first.
pub const DEFAULT_CANDIDATE_BAUDS: [u32; 5] = [115200, 57600, 38400, 9600, 4800];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub candidate_bauds: Vec<u32>,
    /// Test window per candidate while acquiring for the first time
    pub acquisition_window_ms: u64,
    /// Test window per candidate after a lock has been lost
    pub retest_window_ms: u64,
    /// No validated sentence for this long means the receiver is not connected
    pub data_timeout_ms: u64,
    pub max_bytes_per_poll: usize,
    /// Send the constellation/sentence setup commands after each lock
    pub configure_receiver: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            candidate_bauds: DEFAULT_CANDIDATE_BAUDS.to_vec(),
            acquisition_window_ms: 5000,
            retest_window_ms: 2000,
            data_timeout_ms: 3000,
            max_bytes_per_poll: 50,
            configure_receiver: true,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.candidate_bauds.is_empty() {
            return Err(GpsError::Config("candidate baud list is empty".to_string()));
        }
        if let Some(zero) = self.candidate_bauds.iter().find(|b| **b == 0) {
            return Err(GpsError::Config(format!("invalid candidate baud rate {}", zero)));
        }
        if self.acquisition_window_ms == 0 || self.retest_window_ms == 0 {
            return Err(GpsError::Config("test windows must be longer than 0 ms".to_string()));
        }
        if self.max_bytes_per_poll == 0 {
            return Err(GpsError::Config("max_bytes_per_poll must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Thresholds applied to decoded fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// A position older than this is treated as no fix
    pub stale_fix_ms: u64,
    /// Derived metrics only advance while HDOP is below this
    pub reliable_hdop: f64,
    /// HDOP reported when the decoder has no valid value
    pub hdop_sentinel: f64,
    /// Speeds below this (mph) are reported as 0
    pub noise_floor_mph: f64,
    /// Speeds at or above this (mph) are decoder glitches and never become the max
    pub max_plausible_mph: f64,
    pub accel_timeout_ms: u64,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            stale_fix_ms: 2000,
            reliable_hdop: 4.0,
            hdop_sentinel: 99.9,
            noise_floor_mph: 0.8,
            max_plausible_mph: 200.0,
            accel_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    pub serial_port: Option<String>,
    pub poll_interval_ms: u64,
    pub diagnostics_interval_ms: u64,
    /// Standard-time offset from UTC; summer time adds an hour
    pub utc_offset_hours: i32,
    pub transport: TransportConfig,
    pub fix: FixConfig,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            poll_interval_ms: 10,
            diagnostics_interval_ms: 5000,
            utc_offset_hours: 1,
            transport: TransportConfig::default(),
            fix: FixConfig::default(),
        }
    }
}

impl HudConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load configuration from a file, falling back to defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)?;
        config.transport.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("gps-hud").join("config.json"))
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String) {
        self.serial_port = Some(port);
    }

    /// Restrict detection to a single known baud rate
    pub fn pin_baud(&mut self, baud: u32) {
        self.transport.candidate_bauds = vec![baud];
    }
}
